//! Engine configuration.
//!
//! `SyncConfig` is immutable for the duration of a run and handed to the
//! [`RunContext`](crate::context::RunContext) at run start. Every field carries
//! a serde default so a partial TOML file is enough to get going.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Root configuration for a reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Master switch for the engine
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory connection and search settings
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Teacher classification settings
    #[serde(default)]
    pub teachers: TeachersConfig,

    /// Group naming conventions
    #[serde(default)]
    pub naming: NamingConfig,

    /// Course enrolment settings
    #[serde(default)]
    pub enrol: EnrolConfig,

    /// Per-teacher category provisioning
    #[serde(default)]
    pub units: UnitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// LDAP URL, e.g. ldap://admin.schule.local:389
    #[serde(default = "default_url")]
    pub url: String,

    /// DN used for the simple bind (empty for anonymous)
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password; usually supplied through the environment
    #[serde(default, skip_serializing)]
    pub bind_password: Option<String>,

    /// Search bases, all of which are queried and aggregated
    #[serde(default = "default_contexts")]
    pub contexts: Vec<String>,

    /// objectClass of group entries
    #[serde(default = "default_object_class")]
    pub object_class: String,

    /// Extra LDAP filter ANDed with the objectClass filter
    #[serde(default)]
    pub filter: Option<String>,

    /// Attribute holding the group name
    #[serde(default = "default_name_attribute")]
    pub name_attribute: String,

    /// Attribute listing the group members
    #[serde(default = "default_member_attribute")]
    pub member_attribute: String,

    /// Member values are full DNs rather than plain identifiers
    #[serde(default)]
    pub member_is_dn: bool,

    /// Connect and operation timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Upgrade plain connections with StartTLS
    #[serde(default)]
    pub starttls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachersConfig {
    /// Name of the directory group listing all teachers
    #[serde(default = "default_teacher_group")]
    pub group: String,

    /// Identifier prefixes that also mark a member as teacher
    #[serde(default)]
    pub prefixes: Vec<String>,

    /// Teachers that never get a category of their own
    #[serde(default)]
    pub ignored: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Regex matching class group names (e.g. "5a", "10", "12b")
    #[serde(default = "default_class_pattern")]
    pub class_pattern: String,

    /// Label put in front of class display names
    #[serde(default = "default_class_label")]
    pub class_label: String,

    /// Prefix marking project groups
    #[serde(default = "default_project_prefix")]
    pub project_prefix: String,

    /// Groups whose teacher members are kept
    #[serde(default)]
    pub teacher_eligible_groups: Vec<String>,

    /// Project groups keep their teacher members
    #[serde(default = "default_true")]
    pub projects_teacher_eligible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolConfig {
    /// The cohort enrolment method is available
    #[serde(default = "default_true")]
    pub cohort_enrol_enabled: bool,

    /// Role for instances bound to ordinary groups
    #[serde(default = "default_student_role")]
    pub student_role: String,

    /// Role for instances bound to teacher-eligible groups
    #[serde(default = "default_teacher_role")]
    pub teacher_role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsConfig {
    /// Provision per-teacher categories
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Display name of the category holding active teacher categories
    #[serde(default = "default_teacher_root")]
    pub teacher_root: String,

    /// Display name of the category holding archived teacher categories
    #[serde(default = "default_archive_root")]
    pub archive_root: String,

    /// Role assigned to a teacher on their own category
    #[serde(default = "default_owner_role")]
    pub owner_role: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_contexts() -> Vec<String> {
    vec!["ou=groups,dc=schule,dc=local".to_string()]
}

fn default_object_class() -> String {
    "posixGroup".to_string()
}

fn default_name_attribute() -> String {
    "cn".to_string()
}

fn default_member_attribute() -> String {
    "memberUid".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_teacher_group() -> String {
    "teachers".to_string()
}

fn default_class_pattern() -> String {
    r"^\d{1,2}[a-z]?$".to_string()
}

fn default_class_label() -> String {
    "Klasse".to_string()
}

fn default_project_prefix() -> String {
    "p_".to_string()
}

fn default_student_role() -> String {
    "student".to_string()
}

fn default_teacher_role() -> String {
    "editingteacher".to_string()
}

fn default_teacher_root() -> String {
    "Teachers".to_string()
}

fn default_archive_root() -> String {
    "Archive".to_string()
}

fn default_owner_role() -> String {
    "manager".to_string()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            bind_dn: String::new(),
            bind_password: None,
            contexts: default_contexts(),
            object_class: default_object_class(),
            filter: None,
            name_attribute: default_name_attribute(),
            member_attribute: default_member_attribute(),
            member_is_dn: false,
            timeout_secs: default_timeout(),
            starttls: false,
        }
    }
}

impl Default for TeachersConfig {
    fn default() -> Self {
        Self {
            group: default_teacher_group(),
            prefixes: Vec::new(),
            ignored: Vec::new(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            class_pattern: default_class_pattern(),
            class_label: default_class_label(),
            project_prefix: default_project_prefix(),
            teacher_eligible_groups: Vec::new(),
            projects_teacher_eligible: true,
        }
    }
}

impl Default for EnrolConfig {
    fn default() -> Self {
        Self {
            cohort_enrol_enabled: true,
            student_role: default_student_role(),
            teacher_role: default_teacher_role(),
        }
    }
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            teacher_root: default_teacher_root(),
            archive_root: default_archive_root(),
            owner_role: default_owner_role(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: DirectoryConfig::default(),
            teachers: TeachersConfig::default(),
            naming: NamingConfig::default(),
            enrol: EnrolConfig::default(),
            units: UnitsConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let dir = &self.directory;
        if dir.contexts.iter().all(|c| c.trim().is_empty()) {
            return Err(Error::Config("directory.contexts must list at least one search base".into()));
        }
        if dir.name_attribute.trim().is_empty() || dir.member_attribute.trim().is_empty() {
            return Err(Error::Config("directory attribute names must not be empty".into()));
        }
        if dir.object_class.trim().is_empty() {
            return Err(Error::Config("directory.object_class must not be empty".into()));
        }
        if self.teachers.group.trim().is_empty() {
            return Err(Error::Config("teachers.group must not be empty".into()));
        }
        if self.enrol.student_role.trim().is_empty() || self.enrol.teacher_role.trim().is_empty() {
            return Err(Error::Config("enrol roles must not be empty".into()));
        }
        if self.units.teacher_root == self.units.archive_root {
            return Err(Error::Config("units.teacher_root and units.archive_root must differ".into()));
        }
        regex::Regex::new(&self.naming.class_pattern)?;
        Ok(())
    }

    /// Why the run would be skipped, if it would.
    pub fn disabled_reason(&self) -> Option<&'static str> {
        if !self.enabled {
            Some("oss enrolment is disabled")
        } else if !self.enrol.cohort_enrol_enabled {
            Some("cohort enrolment is disabled")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.directory.name_attribute, "cn");
        assert_eq!(config.teachers.group, "teachers");
        assert_eq!(config.enrol.teacher_role, "editingteacher");
        assert!(config.disabled_reason().is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SyncConfig::from_toml(
            r#"
            [directory]
            url = "ldaps://oss.example:636"
            contexts = ["ou=groups,dc=a", "ou=projects,dc=a"]
            member_is_dn = true

            [teachers]
            ignored = ["admin"]
            "#,
        )
        .unwrap();

        assert_eq!(config.directory.contexts.len(), 2);
        assert!(config.directory.member_is_dn);
        assert_eq!(config.directory.member_attribute, "memberUid");
        assert_eq!(config.teachers.ignored, vec!["admin"]);
        assert_eq!(config.units.archive_root, "Archive");
    }

    #[test]
    fn test_invalid_class_pattern_rejected() {
        let result = SyncConfig::from_toml(
            r#"
            [naming]
            class_pattern = "(["
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_contexts_rejected() {
        let mut config = SyncConfig::default();
        config.directory.contexts = vec![" ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_reason() {
        let mut config = SyncConfig::default();
        config.enrol.cohort_enrol_enabled = false;
        assert_eq!(config.disabled_reason(), Some("cohort enrolment is disabled"));

        config.enabled = false;
        assert_eq!(config.disabled_reason(), Some("oss enrolment is disabled"));
    }
}
