//! vowlpack - build tool and dev server for the WebVOWL reimagined app.

#![allow(dead_code)]

mod bootstrap;
mod cli;
mod config;
mod core;
mod embed;
mod error;
mod logger;
mod paths;
mod pipeline;
mod serve;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::ProjectConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = ProjectConfig::load(&cli.config)?;
    cli::dispatch(&cli, config)
}
