//! Teacher classification.
//!
//! The teacher roster is read from the directory once per run and kept in
//! memory until the run ends. Members matching a teacher prefix count as
//! teachers too; when prefixes are configured they are collected from every
//! group at load time so they get categories like roster teachers.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::directory::{normalize_member, DirectoryClient, GroupQuery};
use crate::error::Result;

/// Run-scoped view of who counts as a teacher.
#[derive(Debug, Clone, Default)]
pub struct RoleClassifier {
    roster: BTreeSet<String>,
    /// Group members outside the roster that match a prefix
    prefixed: BTreeSet<String>,
    prefixes: Vec<String>,
    ignored: BTreeSet<String>,
}

impl RoleClassifier {
    pub fn new<I>(roster: I, config: &SyncConfig) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            roster: roster.into_iter().map(|m| normalize_member(&m)).collect(),
            prefixed: BTreeSet::new(),
            prefixes: config
                .teachers
                .prefixes
                .iter()
                .map(|p| normalize_member(p))
                .filter(|p| !p.is_empty())
                .collect(),
            ignored: config.teachers.ignored.iter().map(|m| normalize_member(m)).collect(),
        }
    }

    /// Read the teacher group from the directory.
    ///
    /// A missing teacher group yields an empty roster; an unreachable directory
    /// is an error because every later decision depends on the roster.
    pub fn load<D: DirectoryClient + ?Sized>(directory: &mut D, config: &SyncConfig) -> Result<Self> {
        let query = GroupQuery::new(&config.directory);
        let roster = match query.fetch(directory, &config.teachers.group)? {
            Some(group) => group.members,
            None => {
                info!("Teacher group {} not found in directory", config.teachers.group);
                BTreeSet::new()
            }
        };
        debug!("Loaded {} teachers from {}", roster.len(), config.teachers.group);
        let mut classifier = Self::new(roster, config);

        if !classifier.prefixes.is_empty() {
            let members: BTreeSet<String> = query
                .list_groups(directory)?
                .into_iter()
                .flat_map(|g| g.members)
                .collect();
            classifier.add_prefixed(members);
            debug!("Found {} prefixed teachers", classifier.prefixed.len());
        }
        Ok(classifier)
    }

    /// Record members that classify as teachers by prefix alone.
    pub fn add_prefixed<I>(&mut self, members: I)
    where
        I: IntoIterator<Item = String>,
    {
        for member in members.into_iter().map(|m| normalize_member(&m)) {
            if !self.roster.contains(&member) && self.has_prefix(&member) {
                self.prefixed.insert(member);
            }
        }
    }

    fn has_prefix(&self, member: &str) -> bool {
        self.prefixes.iter().any(|p| member.starts_with(p.as_str()))
    }

    pub fn is_teacher(&self, member: &str) -> bool {
        let member = normalize_member(member);
        self.roster.contains(&member) || self.has_prefix(&member)
    }

    pub fn is_ignored(&self, member: &str) -> bool {
        self.ignored.contains(&normalize_member(member))
    }

    /// Teachers that should own a category of their own, in name order.
    pub fn provisionable(&self) -> impl Iterator<Item = &String> {
        self.roster
            .union(&self.prefixed)
            .filter(|m| !self.ignored.contains(*m))
    }

    pub fn roster(&self) -> &BTreeSet<String> {
        &self.roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;

    fn config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.directory.contexts = vec!["dc=a".to_string()];
        config.teachers.prefixes = vec!["L_".to_string()];
        config.teachers.ignored = vec!["Admin".to_string()];
        config
    }

    #[test]
    fn test_classification() {
        let classifier = RoleClassifier::new(vec!["T1".to_string(), "admin".to_string()], &config());
        assert!(classifier.is_teacher("t1"));
        assert!(classifier.is_teacher("l_meier"));
        assert!(!classifier.is_teacher("u1"));
        assert!(classifier.is_ignored("ADMIN"));
        assert!(!classifier.is_ignored("t1"));

        let provisionable: Vec<_> = classifier.provisionable().cloned().collect();
        assert_eq!(provisionable, vec!["t1"]);
    }

    #[test]
    fn test_load_from_directory() {
        let mut dir = StaticDirectory::new();
        dir.add_group("dc=a", "teachers", ["t1", "t2"]);
        let classifier = RoleClassifier::load(&mut dir, &config()).unwrap();
        assert_eq!(classifier.roster().len(), 2);
        assert!(classifier.is_teacher("t2"));
    }

    #[test]
    fn test_load_collects_prefixed_members() {
        let mut dir = StaticDirectory::new();
        dir.add_group("dc=a", "teachers", ["t1"]);
        dir.add_group("dc=a", "5a", ["u1", "L_Meier", "t1"]);
        dir.add_group("dc=a", "p_chess", ["l_meier", "l_admin"]);
        let mut config = config();
        config.teachers.ignored = vec!["l_admin".to_string()];

        let classifier = RoleClassifier::load(&mut dir, &config).unwrap();
        let provisionable: Vec<_> = classifier.provisionable().cloned().collect();
        assert_eq!(provisionable, vec!["l_meier", "t1"]);
        assert_eq!(classifier.roster().len(), 1);
    }

    #[test]
    fn test_load_with_differently_cased_group_name() {
        let mut dir = StaticDirectory::new();
        dir.add_group("dc=a", "teachers", ["t1"]);
        let mut config = config();
        config.teachers.group = "Teachers".to_string();

        let classifier = RoleClassifier::load(&mut dir, &config).unwrap();
        assert_eq!(classifier.roster().iter().collect::<Vec<_>>(), vec!["t1"]);
        assert!(classifier.is_teacher("t1"));
    }

    #[test]
    fn test_load_without_teacher_group() {
        let mut dir = StaticDirectory::new();
        let classifier = RoleClassifier::load(&mut dir, &config()).unwrap();
        assert!(classifier.roster().is_empty());
    }

    #[test]
    fn test_load_unreachable() {
        let mut dir = StaticDirectory::new();
        dir.set_unreachable(true);
        assert!(RoleClassifier::load(&mut dir, &config()).is_err());
    }
}
