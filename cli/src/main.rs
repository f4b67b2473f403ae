// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A command line tool for mirroring a debounced GPIO button onto a GPIO LED.

use clap::Parser;
use std::process::ExitCode;

mod common;
mod mirror;
mod pins;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match Opts::try_parse() {
        Ok(opt) => {
            let res = match opt.cmd {
                Command::Mirror(cfg) => mirror::cmd(&cfg),
                Command::Pins(cfg) => pins::cmd(&cfg),
            };
            return if res {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
        Err(e) => eprintln!("{e}"),
    }
    ExitCode::FAILURE
}

#[derive(Parser)]
#[command(
    name = "gpiomirror",
    about = "A utility to light a GPIO LED while a GPIO button is held, using GPIO character devices.",
    version,
    propagate_version = true
)]
struct Opts {
    /// Provide more detailed error messages.
    #[arg(short = 'v', long, global = true, display_order = 800)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
enum Command {
    /// Mirror the debounced state of a button onto an LED.
    Mirror(mirror::Opts),

    /// List the names of the available GPIO pins.
    Pins(pins::Opts),
}
