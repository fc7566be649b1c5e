//! Error types for oss-enrol.

use thiserror::Error;

/// Failures the CLI maps to a specific exit code.
#[derive(Error, Debug)]
pub enum CliError {
    /// The run completed but some entities were abandoned
    #[error("{count} error(s) recorded during {task}")]
    EntitiesFailed { task: String, count: usize },

    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::EntitiesFailed { .. } => 2,
            CliError::Fixture(_) => 1,
        }
    }
}
