/*
 * gutka - gurbani bookmark library, backup, restore, and import
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::future_not_send)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::literal_string_with_formatting_args)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::option_if_let_else)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unused_async)]

mod cli;

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use gutka::config::LOG_ENV;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose, cli.color);
    if let Err(err) = cli::run(cli).await {
        tracing::debug!("command failed: {err:?}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

/// Log directives used when `GUTKA_LOG` is not set. `-v` turns on debug output
/// of this tool and the content client, `-vv` traces them including http bodies.
fn default_log_directives(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "warn,gutka=debug,gurbani=debug",
        _ => "info,gutka=trace,gurbani=trace",
    }
}

fn log_filter(verbose: u8) -> Result<EnvFilter> {
    let directives = std::env::var(LOG_ENV)
        .unwrap_or_else(|_| default_log_directives(verbose).to_string());
    Ok(EnvFilter::try_new(&directives)?)
}

fn init_tracing(verbose: u8, color: cli::ColorArg) {
    let filter = log_filter(verbose).unwrap_or_else(|err| {
        eprintln!("warning: ignoring invalid {LOG_ENV}: {err}");
        EnvFilter::new(default_log_directives(verbose))
    });
    let ansi = match color {
        cli::ColorArg::Always => true,
        cli::ColorArg::Never => false,
        cli::ColorArg::Auto => io::stderr().is_terminal(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(verbose > 1)
        .with_writer(io::stderr)
        .init();
}
