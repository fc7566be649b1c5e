//! Database types for oss-enrol-core.

use serde::{Deserialize, Serialize};

/// Origin marker on every row the engine owns.
pub const COMPONENT: &str = "enrol_oss";

/// Role assignment context for course categories.
pub const CONTEXT_CATEGORY: &str = "category";

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

/// Local mirror of a directory group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub id: String,
    /// Directory group name
    pub idnumber: String,
    pub name: String,
    /// Origin marker; `COMPONENT` for cohorts this engine manages
    pub component: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Cohort {
    pub fn is_owned(&self) -> bool {
        self.component == COMPONENT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub idnumber: Option<String>,
    pub parent_id: Option<String>,
    /// Member owning a per-teacher category
    pub owner: Option<String>,
    pub sort_order: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub shortname: String,
    pub fullname: String,
    pub category_id: Option<String>,
    /// Encoded group mapping, `shortname:token1,token2`
    pub idnumber: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolInstance {
    pub id: String,
    pub course_id: String,
    pub cohort_id: String,
    /// Group token from the course mapping
    pub token: String,
    pub role: String,
    pub component: String,
    pub created_at: i64,
}

impl EnrolInstance {
    pub fn is_owned(&self) -> bool {
        self.component == COMPONENT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Types (for creating entities)
// ─────────────────────────────────────────────────────────────────────────────

/// Input for creating a new cohort
#[derive(Debug, Clone)]
pub struct NewCohort {
    pub idnumber: String,
    pub name: String,
    pub component: String,
}

/// Input for creating a new category
#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub idnumber: Option<String>,
    pub parent_id: Option<String>,
    pub owner: Option<String>,
}

/// Input for creating a new course
#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub shortname: String,
    pub fullname: String,
    pub category_id: Option<String>,
    pub idnumber: String,
}

/// Input for creating a new enrolment instance
#[derive(Debug, Clone)]
pub struct NewEnrolInstance {
    pub course_id: String,
    pub cohort_id: String,
    pub token: String,
    pub role: String,
    pub component: String,
}
