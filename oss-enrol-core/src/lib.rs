//! oss-enrol-core - Directory reconciliation engine
//!
//! Mirrors the groups of a school server directory into a local membership
//! store and derives teacher categories and course enrolments from them:
//!
//! - **directory**: `DirectoryClient` trait, LDAP and in-memory clients
//! - **db**: SQLite store for cohorts, categories, courses and enrolments
//! - **cohort_sync**: directory groups to local cohorts
//! - **units**: per-teacher course categories
//! - **course_sync**: course idnumber mappings to enrolment instances
//! - **task**: runnable entry points returning a `RunReport`

pub mod cohort_sync;
pub mod config;
pub mod context;
pub mod course_sync;
pub mod db;
pub mod directory;
pub mod error;
pub mod naming;
pub mod report;
pub mod roles;
pub mod task;
pub mod units;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::SyncConfig;
pub use context::RunContext;
pub use db::Database;
pub use directory::{DirectoryClient, StaticDirectory};
#[cfg(feature = "ldap")]
pub use directory::LdapDirectory;
pub use error::{Error, Result};
pub use report::{IssueKind, RunReport};
pub use task::{run_task, CategorySync, CourseSync, FullSync, RepairUnits, SyncTask};
