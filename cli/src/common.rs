// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use clap::Parser;
use gpiomirror::Timestamp;
use std::time::Duration;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseDurationError {
    #[error("'{0}' unknown units - use 's', 'ms' or 'us'.")]
    Units(String),
    #[error("'{0}' must start with a digit")]
    NoDigits(String),
    #[error("'{0}' {1}")]
    ParseDigits(String, std::num::ParseIntError),
}

pub fn parse_duration(s: &str) -> std::result::Result<Duration, ParseDurationError> {
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    let t = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(0) => return Err(ParseDurationError::NoDigits(s.into())),
        Some(n) => {
            let (num, units) = s.split_at(n);
            let t = num
                .parse::<u64>()
                .map_err(|e| ParseDurationError::ParseDigits(num.into(), e))?;
            t * match units {
                "us" => 1000,
                "ms" => 1000000,
                "s" => 1000000000,
                _ => return Err(ParseDurationError::Units(s.into())),
            }
        }
        None => {
            s.parse::<u64>()
                .map_err(|e| ParseDurationError::ParseDigits(s.into(), e))?
                * 1000000
        }
    };
    Ok(Duration::from_nanos(t))
}

#[derive(Clone, Copy, Debug, Default, Parser)]
pub struct EmitOpts {
    #[arg(from_global)]
    pub verbose: bool,

    /// Emit output in JSON format
    #[cfg(feature = "json")]
    #[arg(long, group = "emit")]
    pub json: bool,

    /// Quote pin names.
    #[arg(long)]
    pub quoted: bool,
}

pub fn emit_error(opts: &EmitOpts, e: &anyhow::Error) {
    let e_str = format_error(opts, e);
    #[cfg(feature = "json")]
    if opts.json {
        println!("{{\"error\":\"{e_str}\"}}");
        return;
    }
    eprintln!("{e_str}");
}

pub fn format_error(opts: &EmitOpts, e: &anyhow::Error) -> String {
    if opts.verbose {
        format!("{e:#}")
    } else {
        format!("{e}")
    }
}

#[cfg(feature = "json")]
pub fn emit_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("{e}"),
    }
}

pub fn format_name(opts: &EmitOpts, name: &str) -> String {
    if opts.quoted {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}

pub enum TimeFmt {
    Seconds,
    Localtime,
    Utc,
}

pub fn format_time(ts: Timestamp, timefmt: &TimeFmt) -> String {
    use chrono::{Local, TimeZone, Utc};

    let ts_sec = (ts.as_nanos() / 1000000000) as i64;
    let ts_nsec = (ts.as_nanos() % 1000000000) as u32;
    // out of range times fall back to seconds
    match timefmt {
        TimeFmt::Seconds => format!("{ts_sec}.{ts_nsec:09}"),
        TimeFmt::Localtime => match Local.timestamp_opt(ts_sec, ts_nsec).single() {
            Some(t) => format!("{}", t.format("%FT%T%.9f")),
            None => format!("{ts_sec}.{ts_nsec:09}"),
        },
        TimeFmt::Utc => match Utc.timestamp_opt(ts_sec, ts_nsec).single() {
            Some(t) => format!("{}", t.format("%FT%T%.9fZ")),
            None => format!("{ts_sec}.{ts_nsec:09}"),
        },
    }
}
