//! Sync task commands.

use std::path::Path;

use anyhow::{Context, Result};
use oss_enrol_core::{run_task, RunReport, SyncTask};
use tracing::debug;

use super::{check_fixture, open_database, report, Source};
use crate::config::Config;
use crate::error::CliError;

/// Run `task`, print its report and fail if any entity was abandoned.
pub fn execute(task: &dyn SyncTask, config: &Config, fixture: Option<&Path>, json: bool) -> Result<()> {
    check_fixture(fixture)?;
    let report = run(task, config, fixture)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print(&report);
    }

    let errors = report.errors().count();
    if errors > 0 {
        return Err(CliError::EntitiesFailed {
            task: report.task.clone(),
            count: errors,
        }
        .into());
    }
    Ok(())
}

pub fn run(task: &dyn SyncTask, config: &Config, fixture: Option<&Path>) -> Result<RunReport> {
    let db = open_database(config)?;
    debug!("Using database {}", config.database.path.display());

    run_task(task, &config.sync, &db, || Source::connect(&config.sync.directory, fixture))
        .with_context(|| format!("{} failed", task.name()))
}
