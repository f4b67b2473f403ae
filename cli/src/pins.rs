// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::common::{self, emit_error, format_name};
use anyhow::Context;
use clap::Parser;
use gpiomirror::cdev::Cdev;
use gpiomirror::Provider;
#[cfg(feature = "serde")]
use serde_derive::Serialize;

#[derive(Debug, Parser)]
#[command(aliases(["p", "ls"]))]
pub struct Opts {
    #[command(flatten)]
    emit: common::EmitOpts,
}

pub fn cmd(opts: &Opts) -> bool {
    match Cdev::new("gpiomirror")
        .pin_names()
        .context("failed to list pins")
    {
        Ok(pins) => {
            emit_pins(opts, &Pins { pins });
            true
        }
        Err(e) => {
            emit_error(&opts.emit, &e);
            false
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize))]
struct Pins {
    pins: Vec<String>,
}

fn emit_pins(opts: &Opts, pins: &Pins) {
    #[cfg(feature = "json")]
    if opts.emit.json {
        common::emit_json(pins);
        return;
    }
    if pins.pins.is_empty() {
        println!("No named pins available.");
        return;
    }
    println!("Available GPIO:");
    for p in &pins.pins {
        println!("\t{}", format_name(&opts.emit, p));
    }
}
