//! Read-only access to the school server directory.
//!
//! The engine only ever talks to the directory through [`DirectoryClient`].
//! [`GroupQuery`] builds the group filters from [`DirectoryConfig`] and turns
//! raw entries into [`DirectoryGroup`]s, aggregating over every configured
//! search context.

#[cfg(feature = "ldap")]
pub mod ldap;
pub mod memory;

#[cfg(feature = "ldap")]
pub use ldap::LdapDirectory;
pub use memory::StaticDirectory;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DirectoryConfig;
use crate::error::Result;

/// A single entry returned by a directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// All values of an attribute. Attribute names compare case-insensitively.
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// First value of an attribute.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

/// Directory capability used by the engine.
pub trait DirectoryClient {
    /// Search every context with `filter` and return all matching entries.
    ///
    /// An error means the directory could not answer; an empty vector means
    /// nothing matched.
    fn search(&mut self, filter: &str, contexts: &[String], attrs: &[&str]) -> Result<Vec<DirectoryEntry>>;
}

impl<T: DirectoryClient + ?Sized> DirectoryClient for &mut T {
    fn search(&mut self, filter: &str, contexts: &[String], attrs: &[&str]) -> Result<Vec<DirectoryEntry>> {
        (**self).search(filter, contexts, attrs)
    }
}

/// A group as the directory sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryGroup {
    pub name: String,
    pub members: BTreeSet<String>,
}

/// Builds group searches from the directory configuration.
pub struct GroupQuery<'a> {
    config: &'a DirectoryConfig,
}

impl<'a> GroupQuery<'a> {
    pub fn new(config: &'a DirectoryConfig) -> Self {
        Self { config }
    }

    /// Filter matching every group the engine is responsible for.
    pub fn base_filter(&self) -> String {
        let class = format!("(objectClass={})", escape_filter_value(&self.config.object_class));
        match self.config.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            Some(extra) => format!("(&{}{})", class, wrap_filter(extra)),
            None => format!("(&{})", class),
        }
    }

    /// Filter matching a single group by name.
    pub fn group_filter(&self, name: &str) -> String {
        let base = self.base_filter();
        // base is always "(&...)": splice the name clause into the conjunction
        let inner = &base[..base.len() - 1];
        format!(
            "{}({}={}))",
            inner,
            self.config.name_attribute,
            escape_filter_value(name)
        )
    }

    /// Names of all groups matching the configured filter, across all contexts.
    pub fn list_names<D: DirectoryClient + ?Sized>(&self, directory: &mut D) -> Result<BTreeSet<String>> {
        let attrs = [self.config.name_attribute.as_str()];
        let entries = directory.search(&self.base_filter(), &self.config.contexts, &attrs)?;
        let names: BTreeSet<String> = self.collect_groups(&entries).into_values().map(|g| g.name).collect();
        debug!("Directory lists {} groups", names.len());
        Ok(names)
    }

    /// Fetch one group with its members; `None` when no context holds it.
    ///
    /// Names match case-insensitively, like the directory's own `cn` matching.
    pub fn fetch<D: DirectoryClient + ?Sized>(&self, directory: &mut D, name: &str) -> Result<Option<DirectoryGroup>> {
        let entries = directory.search(&self.group_filter(name), &self.config.contexts, &self.group_attrs())?;
        Ok(self.collect_groups(&entries).remove(&name.trim().to_lowercase()))
    }

    /// Every group matching the configured filter, with members.
    pub fn list_groups<D: DirectoryClient + ?Sized>(&self, directory: &mut D) -> Result<Vec<DirectoryGroup>> {
        let entries = directory.search(&self.base_filter(), &self.config.contexts, &self.group_attrs())?;
        Ok(self.collect_groups(&entries).into_values().collect())
    }

    fn group_attrs(&self) -> [&str; 2] {
        [
            self.config.name_attribute.as_str(),
            self.config.member_attribute.as_str(),
        ]
    }

    /// Merge entries by group name, ignoring case. A group present in several
    /// contexts gets the union of its member lists and keeps the spelling of
    /// the first entry seen.
    fn collect_groups(&self, entries: &[DirectoryEntry]) -> BTreeMap<String, DirectoryGroup> {
        let mut groups: BTreeMap<String, DirectoryGroup> = BTreeMap::new();
        for entry in entries {
            let Some(name) = entry.first(&self.config.name_attribute).map(str::trim) else {
                debug!("Skipping entry without {}: {}", self.config.name_attribute, entry.dn);
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let group = groups.entry(name.to_lowercase()).or_insert_with(|| DirectoryGroup {
                name: name.to_string(),
                members: BTreeSet::new(),
            });
            group.members.extend(
                entry
                    .values(&self.config.member_attribute)
                    .iter()
                    .filter_map(|v| member_from_value(v, self.config.member_is_dn)),
            );
        }
        groups
    }
}

/// Extract a member identifier from a member attribute value.
///
/// DN values yield the value of their first RDN (`uid=u1,ou=people,...` → `u1`).
/// Identifiers are lowercased.
pub fn member_from_value(value: &str, is_dn: bool) -> Option<String> {
    let raw = if is_dn {
        let rdn = value.split(',').next()?;
        rdn.split_once('=').map(|(_, v)| v)?
    } else {
        value
    };
    let id = normalize_member(raw);
    (!id.is_empty()).then_some(id)
}

/// Canonical form of a member identifier.
pub fn normalize_member(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Escape a value for use inside an LDAP filter (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\5c"),
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

fn wrap_filter(filter: &str) -> String {
    if filter.starts_with('(') {
        filter.to_string()
    } else {
        format!("({})", filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DirectoryConfig {
        DirectoryConfig {
            contexts: vec!["ou=groups,dc=a".to_string(), "ou=projects,dc=a".to_string()],
            ..DirectoryConfig::default()
        }
    }

    #[test]
    fn test_base_filter_without_extra() {
        let cfg = config();
        assert_eq!(GroupQuery::new(&cfg).base_filter(), "(&(objectClass=posixGroup))");
    }

    #[test]
    fn test_group_filter_with_extra() {
        let mut cfg = config();
        cfg.filter = Some("gidNumber>=1000".to_string());
        let query = GroupQuery::new(&cfg);
        assert_eq!(
            query.group_filter("5a"),
            "(&(objectClass=posixGroup)(gidNumber>=1000)(cn=5a))"
        );
    }

    #[test]
    fn test_group_filter_escapes_name() {
        let cfg = config();
        let filter = GroupQuery::new(&cfg).group_filter("a*(b)");
        assert!(filter.ends_with("(cn=a\\2a\\28b\\29))"));
    }

    #[test]
    fn test_member_from_dn() {
        assert_eq!(
            member_from_value("uid=U1,ou=people,dc=a", true),
            Some("u1".to_string())
        );
        assert_eq!(member_from_value("garbage", true), None);
        assert_eq!(member_from_value("  Bob ", false), Some("bob".to_string()));
        assert_eq!(member_from_value("   ", false), None);
    }

    #[test]
    fn test_fetch_merges_contexts() {
        let cfg = config();
        let mut dir = StaticDirectory::new();
        dir.add_group("ou=groups,dc=a", "5a", ["u1", "u2"]);
        dir.add_group("ou=projects,dc=a", "5a", ["u3"]);

        let group = GroupQuery::new(&cfg).fetch(&mut dir, "5a").unwrap().unwrap();
        assert_eq!(group.members.len(), 3);
        assert!(group.members.contains("u3"));
    }

    #[test]
    fn test_fetch_missing_group() {
        let cfg = config();
        let mut dir = StaticDirectory::new();
        assert!(GroupQuery::new(&cfg).fetch(&mut dir, "nope").unwrap().is_none());
    }

    #[test]
    fn test_fetch_ignores_name_case() {
        let cfg = config();
        let mut dir = StaticDirectory::new();
        dir.add_group("ou=groups,dc=a", "teachers", ["t1"]);
        dir.add_group("ou=projects,dc=a", "TEACHERS", ["t2"]);

        let query = GroupQuery::new(&cfg);
        let group = query.fetch(&mut dir, "Teachers").unwrap().unwrap();
        assert_eq!(group.members, BTreeSet::from(["t1".to_string(), "t2".to_string()]));

        let names = query.list_names(&mut dir).unwrap();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_list_groups_with_members() {
        let cfg = config();
        let mut dir = StaticDirectory::new();
        dir.add_group("ou=groups,dc=a", "5a", ["u1", "L_Meier"]);
        dir.add_group("ou=projects,dc=a", "p_chess", ["u2"]);

        let groups = GroupQuery::new(&cfg).list_groups(&mut dir).unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups[0].members.contains("l_meier"));
    }

    #[test]
    fn test_list_names_ignores_foreign_contexts() {
        let cfg = config();
        let mut dir = StaticDirectory::new();
        dir.add_group("ou=groups,dc=a", "5a", ["u1"]);
        dir.add_group("ou=other,dc=b", "secret", ["u9"]);

        let names = GroupQuery::new(&cfg).list_names(&mut dir).unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["5a"]);
    }
}
