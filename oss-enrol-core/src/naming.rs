//! Group naming conventions.
//!
//! School servers encode the kind of a group in its name: classes look like
//! `5a` or `12`, projects carry a prefix, and one group lists the teachers.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Teachers,
    Class,
    Project,
    Other,
}

/// Compiled naming rules for one run.
#[derive(Debug, Clone)]
pub struct GroupNaming {
    class_pattern: Regex,
    class_label: String,
    project_prefix: String,
    teacher_group: String,
    teacher_eligible: Vec<String>,
    projects_teacher_eligible: bool,
}

impl GroupNaming {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let naming = &config.naming;
        Ok(Self {
            class_pattern: Regex::new(&naming.class_pattern)?,
            class_label: naming.class_label.trim().to_string(),
            project_prefix: naming.project_prefix.clone(),
            teacher_group: config.teachers.group.clone(),
            teacher_eligible: naming.teacher_eligible_groups.clone(),
            projects_teacher_eligible: naming.projects_teacher_eligible,
        })
    }

    pub fn kind(&self, name: &str) -> GroupKind {
        if name.eq_ignore_ascii_case(&self.teacher_group) {
            GroupKind::Teachers
        } else if !self.project_prefix.is_empty() && name.starts_with(&self.project_prefix) {
            GroupKind::Project
        } else if self.class_pattern.is_match(name) {
            GroupKind::Class
        } else {
            GroupKind::Other
        }
    }

    /// Human-readable cohort name for a directory group.
    pub fn display_name(&self, name: &str) -> String {
        match self.kind(name) {
            GroupKind::Class if !self.class_label.is_empty() => format!("{} {}", self.class_label, name),
            GroupKind::Project => {
                let stripped = &name[self.project_prefix.len()..];
                if stripped.is_empty() {
                    name.to_string()
                } else {
                    stripped.to_string()
                }
            }
            _ => name.to_string(),
        }
    }

    /// Whether teacher members stay in this group.
    pub fn is_teacher_eligible(&self, name: &str) -> bool {
        match self.kind(name) {
            GroupKind::Teachers => true,
            GroupKind::Project if self.projects_teacher_eligible => true,
            _ => self.teacher_eligible.iter().any(|g| g.eq_ignore_ascii_case(name)),
        }
    }
}
