// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::common::{self, emit_error, format_name, format_time, TimeFmt};
use anyhow::{anyhow, Context};
use clap::Parser;
use gpiomirror::cdev::Cdev;
use gpiomirror::mirror::{Config, Mirror};
use gpiomirror::{ChannelSink, EdgeEvent, EventClock, LogicalLevel, Polarity, Status};
#[cfg(feature = "serde")]
use serde_derive::Serialize;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(alias("m"))]
pub struct Opts {
    /// The input pin connected to the button
    ///
    /// Pins are identified by line name, or by chip and offset,
    /// e.g. gpiochip0:17 or 0:17.
    #[arg(
        value_name = "button",
        env = "GPIOMIRROR_BUTTON",
        default_value = "GPIO_174"
    )]
    button: String,

    /// The output pin connected to the LED
    #[arg(value_name = "led", env = "GPIOMIRROR_LED", default_value = "GPIO_34")]
    led: String,

    /// The button is pressed when the input is high
    ///
    /// By default the button is taken to pull a pulled-up input low
    /// when pressed.
    #[arg(long)]
    button_active_high: bool,

    /// The LED is lit when the output is low
    #[arg(long)]
    led_active_low: bool,

    /// The period the button must be stable before a change is accepted
    ///
    /// The period is taken as milliseconds unless otherwise specified.
    #[arg(
        short = 'p',
        long,
        value_name = "period",
        default_value = "30ms",
        value_parser = common::parse_duration
    )]
    debounce_period: Duration,

    /// Display a banner on successful startup
    #[arg(long)]
    banner: bool,

    /// Exit if no state changes are received for the specified period.
    ///
    /// The period is taken as milliseconds unless otherwise specified.
    #[arg(long, value_name = "period", value_parser = common::parse_duration)]
    idle_timeout: Option<Duration>,

    /// Exit after the specified number of state changes
    ///
    /// If not specified then mirroring will continue indefinitely.
    #[arg(short, long, value_name = "num")]
    num_events: Option<u32>,

    /// Format event timestamps as local time
    #[arg(long, group = "timefmt")]
    localtime: bool,

    /// Format event timestamps as UTC
    #[arg(long, group = "timefmt")]
    utc: bool,

    /// Don't generate any output
    #[arg(short = 'q', long, groups = ["emit", "timefmt"], alias = "silent")]
    quiet: bool,

    /// The consumer label applied to requested lines.
    #[arg(short = 'C', long, value_name = "name", default_value = "gpiomirror")]
    consumer: String,

    #[command(flatten)]
    emit: common::EmitOpts,
}

impl Opts {
    // mutate the config to match the configuration
    fn apply(&self, config: &mut Config) {
        config
            .with_input(&self.button)
            .with_output(&self.led)
            .with_debounce_period(self.debounce_period);
        if self.button_active_high {
            config.with_input_polarity(Polarity::ActiveHigh);
        }
        if self.led_active_low {
            config.with_output_polarity(Polarity::ActiveLow);
        }
        // wall clock timestamps require a realtime clock
        if self.localtime || self.utc {
            config.with_event_clock(EventClock::Realtime);
        }
    }

    fn timefmt(&self) -> TimeFmt {
        if self.localtime {
            TimeFmt::Localtime
        } else if self.utc {
            TimeFmt::Utc
        } else {
            TimeFmt::Seconds
        }
    }
}

pub fn cmd(opts: &Opts) -> bool {
    match do_cmd(opts) {
        Ok(()) => true,
        Err(e) => {
            emit_error(&opts.emit, &e);
            false
        }
    }
}

fn do_cmd(opts: &Opts) -> anyhow::Result<()> {
    let mut cfg = Config::default();
    opts.apply(&mut cfg);
    let (tx, rx) = mpsc::channel();
    let provider = Arc::new(Cdev::new(opts.consumer.as_str()));
    let mirror = Mirror::open(provider, &cfg, ChannelSink::new(tx))
        .with_context(|| format!("failed to mirror '{}' onto '{}'", opts.button, opts.led))?;
    log::info!(
        "mirroring '{}' onto '{}', button initially {}",
        opts.button,
        opts.led,
        mirror.level().unwrap_or_default()
    );
    emit_banner(opts);
    let res = watch(opts, &rx);
    let closed = mirror
        .close()
        .with_context(|| format!("failed to release '{}' and '{}'", opts.button, opts.led));
    res.and(closed)
}

// report state changes until a limit is reached
fn watch(opts: &Opts, rx: &Receiver<Status>) -> anyhow::Result<()> {
    use std::io::Write;

    let timefmt = opts.timefmt();
    let mut count = 0;
    loop {
        let status = match opts.idle_timeout {
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(status) => status,
                Err(RecvTimeoutError::Timeout) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("dispatcher stopped unexpectedly"))
                }
            },
            None => rx
                .recv()
                .map_err(|_| anyhow!("dispatcher stopped unexpectedly"))?,
        };
        match status {
            Status::Changed(event) => {
                emit_event(&event, opts, &timefmt);
                if let Some(limit) = opts.num_events {
                    count += 1;
                    if count >= limit {
                        return Ok(());
                    }
                }
            }
            // runtime errors are reported and mirroring continues
            Status::Failed(kind, e) => {
                emit_error(&opts.emit, &anyhow!(e).context(kind.to_string()));
            }
        }
        _ = std::io::stdout().flush();
    }
}

fn emit_banner(opts: &Opts) {
    use std::io::Write;

    if !opts.banner {
        return;
    }
    println!("Mirroring button '{}' onto LED '{}'...", opts.button, opts.led);
    _ = std::io::stdout().flush();
}

fn emit_event(edge: &EdgeEvent, opts: &Opts, timefmt: &TimeFmt) {
    if opts.quiet {
        return;
    }
    let event = Event {
        name: &opts.button,
        level: edge.level,
        timestamp: format_time(edge.observed_at, timefmt),
    };

    #[cfg(feature = "json")]
    if opts.emit.json {
        common::emit_json(&event);
        return;
    }
    event.print(opts);
}

#[cfg_attr(feature = "serde", derive(Serialize))]
struct Event<'a> {
    name: &'a str,
    level: LogicalLevel,
    timestamp: String,
}

impl Event<'_> {
    fn print(&self, opts: &Opts) {
        println!(
            "{}\t{}\t{}",
            self.timestamp,
            state_name(self.level),
            format_name(&opts.emit, self.name)
        );
    }
}

// the label shown for the button state
fn state_name(level: LogicalLevel) -> &'static str {
    match level {
        LogicalLevel::Asserted => "pressed",
        LogicalLevel::Deasserted => "released",
    }
}
