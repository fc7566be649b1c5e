//! oss-enrol - Directory reconciliation CLI
//!
//! Mirrors school server groups into local cohorts, keeps one course
//! category per teacher and derives course enrolments from course idnumbers.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use oss_enrol_core::{CategorySync, CourseSync, FullSync, RepairUnits};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod error;

use cli::{Cli, Commands};
use error::CliError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<CliError>() {
                Some(cli_error) => ExitCode::from(cli_error.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "oss_enrol=debug" } else { "oss_enrol=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = config::Config::load(cli.config.as_deref())?;
    let config = match cli.database {
        Some(path) => config::Config {
            database: config::DatabaseConfig { path },
            ..config
        },
        None => config,
    };
    let fixture = cli.fixture.as_deref();

    // Execute command
    match cli.command {
        Commands::Sync => commands::run::execute(&FullSync, &config, fixture, cli.json),
        Commands::RepairUnits => commands::run::execute(&RepairUnits, &config, fixture, cli.json),
        Commands::SyncCourse { course } => {
            let task = CourseSync { course_id: course };
            commands::run::execute(&task, &config, fixture, cli.json)
        }
        Commands::SyncCategory { category } => {
            let task = CategorySync { category_id: category };
            commands::run::execute(&task, &config, fixture, cli.json)
        }
        Commands::Doctor => {
            let config_path = cli.config.unwrap_or_else(config::Config::config_path);
            commands::doctor::execute(&config, &config_path, fixture)
        }
        Commands::Version => {
            println!("oss-enrol {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
