//! CLI argument definitions using clap derive macros.
//!
//! Every subcommand except `doctor` and `version` runs one sync task and
//! prints its run report.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Reconcile school server directory groups with the local course store
#[derive(Parser, Debug)]
#[command(name = "oss-enrol")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "OSS_ENROL_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database (overrides [database] path)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Read directory groups from a JSON fixture instead of LDAP
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync groups, teacher categories and course enrolments
    Sync,

    /// Repair teacher categories (adopt, restore roles, re-sort)
    RepairUnits,

    /// Sync the enrolment instances of one course
    SyncCourse {
        /// Course id or shortname
        course: String,
    },

    /// Sync every course in one category
    SyncCategory {
        /// Category id
        category: String,
    },

    /// Run diagnostics
    Doctor,

    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_course() {
        let cli = Cli::parse_from(["oss-enrol", "--json", "sync-course", "math101"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::SyncCourse { course } if course == "math101"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["oss-enrol", "sync", "-v", "--fixture", "groups.json"]);
        assert!(cli.verbose);
        assert_eq!(cli.fixture, Some(PathBuf::from("groups.json")));
        assert!(matches!(cli.command, Commands::Sync));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
