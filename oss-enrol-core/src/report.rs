//! Run report.
//!
//! Every operation records what it changed and every failure it swallowed.
//! The report is returned to the caller at the end of the run instead of
//! being reconstructed from log output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Engine or a dependency switched off; the run was skipped
    ConfigurationDisabled,
    /// Directory search failed; the affected entity is retried next run
    DirectoryUnreachable,
    /// More than one active category with the same name
    DuplicateUnit,
    /// A store write failed; only the current entity was abandoned
    WriteFailure,
    /// Record belongs to another component and was left alone
    ForeignRecord,
    /// Course mapping names a group that does not exist locally
    UnknownGroup,
}

impl IssueKind {
    /// Warnings need attention but do not mean lost work.
    pub fn is_warning(self) -> bool {
        matches!(
            self,
            IssueKind::ConfigurationDisabled
                | IssueKind::DuplicateUnit
                | IssueKind::ForeignRecord
                | IssueKind::UnknownGroup
        )
    }

    fn from_error(error: &Error) -> Self {
        match error {
            Error::DirectoryUnreachable(_) | Error::DirectoryBind { .. } => IssueKind::DirectoryUnreachable,
            Error::ForeignRecord(_) => IssueKind::ForeignRecord,
            Error::ConfigurationDisabled(_) => IssueKind::ConfigurationDisabled,
            _ => IssueKind::WriteFailure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// What the issue is about, e.g. "group 5a"
    pub subject: String,
    pub message: String,
}

/// Change counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub groups_created: u32,
    pub groups_renamed: u32,
    pub groups_deleted: u32,
    pub members_added: u32,
    pub members_removed: u32,
    pub units_created: u32,
    pub units_archived: u32,
    pub units_restored: u32,
    pub units_adopted: u32,
    pub units_resequenced: u32,
    pub roles_assigned: u32,
    pub idnumbers_migrated: u32,
    pub instances_created: u32,
    pub instances_deleted: u32,
    pub enrolments_added: u32,
    pub enrolments_removed: u32,
}

impl Counters {
    /// Total number of store writes.
    pub fn writes(&self) -> u32 {
        self.groups_created
            + self.groups_renamed
            + self.groups_deleted
            + self.members_added
            + self.members_removed
            + self.units_created
            + self.units_archived
            + self.units_restored
            + self.units_adopted
            + self.units_resequenced
            + self.roles_assigned
            + self.idnumbers_migrated
            + self.instances_created
            + self.instances_deleted
            + self.enrolments_added
            + self.enrolments_removed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the run was skipped entirely
    pub skipped: Option<String>,
    pub counters: Counters,
    pub issues: Vec<Issue>,
}

impl RunReport {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            started_at: Utc::now(),
            finished_at: None,
            skipped: None,
            counters: Counters::default(),
            issues: Vec::new(),
        }
    }

    /// Record an issue and log it.
    pub fn record(&mut self, kind: IssueKind, subject: impl Into<String>, message: impl Into<String>) {
        let issue = Issue {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        if kind.is_warning() {
            warn!("{}: {}", issue.subject, issue.message);
        } else {
            error!("{}: {}", issue.subject, issue.message);
        }
        self.issues.push(issue);
    }

    /// Record an error swallowed at an operation boundary.
    pub fn record_error(&mut self, subject: impl Into<String>, error: &Error) {
        self.record(IssueKind::from_error(error), subject, error.to_string());
    }

    /// Mark the run as skipped.
    pub fn skip(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.record(IssueKind::ConfigurationDisabled, self.task.clone(), reason.clone());
        self.skipped = Some(reason);
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        info!(
            "{} finished: {} writes, {} warnings, {} errors",
            self.task,
            self.counters.writes(),
            self.warnings().count(),
            self.errors().count()
        );
        self
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.kind.is_warning())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| !i.kind.is_warning())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_maps_kind() {
        let mut report = RunReport::new("sync");
        report.record_error("group 5a", &Error::DirectoryUnreachable("timeout".into()));
        report.record_error("course math", &Error::write_failure("course math", "locked"));
        report.record_error("group staff", &Error::ForeignRecord("cohort staff".into()));

        assert_eq!(report.issues_of(IssueKind::DirectoryUnreachable).count(), 1);
        assert_eq!(report.issues_of(IssueKind::WriteFailure).count(), 1);
        assert_eq!(report.warnings().count(), 1);
        assert!(report.has_errors());
    }

    #[test]
    fn test_skip_is_not_an_error() {
        let mut report = RunReport::new("sync");
        report.skip("cohort enrolment is disabled");
        let report = report.finish();

        assert_eq!(report.skipped.as_deref(), Some("cohort enrolment is disabled"));
        assert!(!report.has_errors());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_writes_sums_counters() {
        let counters = Counters {
            members_added: 2,
            units_created: 1,
            enrolments_removed: 3,
            ..Counters::default()
        };
        assert_eq!(counters.writes(), 6);
    }
}
