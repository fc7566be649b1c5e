//! In-memory directory.
//!
//! Evaluates the subset of RFC 4515 filters the engine produces (`&`, `|`,
//! `!`, equality, presence, substring and ordering matches) against a fixed
//! list of entries. Used by tests and by `oss-enrol sync --fixture`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{DirectoryClient, DirectoryEntry};
use crate::error::{Error, Result};

/// A directory backed by a vector of entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticDirectory {
    entries: Vec<DirectoryEntry>,

    /// Every search fails while set
    #[serde(default)]
    unreachable: bool,

    /// Searches whose filter contains one of these fragments fail
    #[serde(default)]
    failing: HashSet<String>,

    /// Number of searches served (including failed ones)
    #[serde(skip)]
    searches: usize,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture: a JSON array of entries.
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<DirectoryEntry> = serde_json::from_str(content)?;
        Ok(Self {
            entries,
            ..Self::default()
        })
    }

    pub fn push(&mut self, entry: DirectoryEntry) {
        self.entries.push(entry);
    }

    /// Add a posixGroup-style entry with `cn` and `memberUid`.
    pub fn add_group<I, S>(&mut self, context: &str, name: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(
            DirectoryEntry::new(format!("cn={},{}", name, context))
                .with_attr("objectClass", ["posixGroup"])
                .with_attr("cn", [name])
                .with_attr("memberUid", members),
        );
    }

    /// Replace the member list of every entry named `name`.
    pub fn set_members<I, S>(&mut self, name: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        for entry in self.entries.iter_mut().filter(|e| e.first("cn") == Some(name)) {
            entry.attrs.insert("memberUid".to_string(), members.clone());
        }
    }

    /// Drop every entry named `name`.
    pub fn remove_group(&mut self, name: &str) {
        self.entries.retain(|e| e.first("cn") != Some(name));
    }

    pub fn set_unreachable(&mut self, unreachable: bool) {
        self.unreachable = unreachable;
    }

    /// Make searches whose filter contains `fragment` fail.
    pub fn fail_on(&mut self, fragment: impl Into<String>) {
        self.failing.insert(fragment.into());
    }

    pub fn search_count(&self) -> usize {
        self.searches
    }
}

impl DirectoryClient for StaticDirectory {
    fn search(&mut self, filter: &str, contexts: &[String], _attrs: &[&str]) -> Result<Vec<DirectoryEntry>> {
        self.searches += 1;
        if self.unreachable {
            return Err(Error::DirectoryUnreachable("static directory marked unreachable".into()));
        }
        if let Some(fragment) = self.failing.iter().find(|f| filter.contains(f.as_str())) {
            return Err(Error::DirectoryUnreachable(format!("search failed on {}", fragment)));
        }

        let parsed = Filter::parse(filter)?;
        Ok(self
            .entries
            .iter()
            .filter(|e| {
                contexts
                    .iter()
                    .filter(|c| !c.trim().is_empty())
                    .any(|c| in_context(&e.dn, c))
            })
            .filter(|e| parsed.matches(e))
            .cloned()
            .collect())
    }
}

fn in_context(dn: &str, context: &str) -> bool {
    let dn = dn.to_ascii_lowercase();
    let context = context.trim().to_ascii_lowercase();
    dn == context || dn.ends_with(&format!(",{}", context))
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
    Substring(String, Vec<String>),
    GreaterOrEqual(String, String),
    LessOrEqual(String, String),
}

impl Filter {
    fn parse(input: &str) -> Result<Self> {
        let mut parser = FilterParser {
            chars: input.trim().chars().collect(),
            pos: 0,
        };
        let filter = parser.filter()?;
        if parser.pos != parser.chars.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(filter)
    }

    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Filter::And(list) => list.iter().all(|f| f.matches(entry)),
            Filter::Or(list) => list.iter().any(|f| f.matches(entry)),
            Filter::Not(inner) => !inner.matches(entry),
            Filter::Present(attr) => !entry.values(attr).is_empty(),
            Filter::Equal(attr, value) => entry.values(attr).iter().any(|v| v.eq_ignore_ascii_case(value)),
            Filter::Substring(attr, parts) => entry.values(attr).iter().any(|v| substring_match(v, parts)),
            Filter::GreaterOrEqual(attr, value) => {
                entry.values(attr).iter().any(|v| compare(v, value) != std::cmp::Ordering::Less)
            }
            Filter::LessOrEqual(attr, value) => {
                entry.values(attr).iter().any(|v| compare(v, value) != std::cmp::Ordering::Greater)
            }
        }
    }
}

/// Integers compare numerically, everything else case-insensitively.
fn compare(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// `parts` is the value split on `*`; the first and last part anchor.
fn substring_match(value: &str, parts: &[String]) -> bool {
    let value = value.to_lowercase();
    let mut rest = value.as_str();
    let last = parts.len().saturating_sub(1);
    for (i, part) in parts.iter().enumerate() {
        let part = part.to_lowercase();
        if i == 0 {
            match rest.strip_prefix(part.as_str()) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(part.as_str());
        } else if let Some(idx) = rest.find(part.as_str()) {
            rest = &rest[idx + part.len()..];
        } else {
            return false;
        }
    }
    true
}

struct FilterParser {
    chars: Vec<char>,
    pos: usize,
}

impl FilterParser {
    fn error(&self, message: &str) -> Error {
        Error::Other(format!("invalid filter at {}: {}", self.pos, message))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn filter(&mut self) -> Result<Filter> {
        self.expect('(')?;
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.list()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end")),
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn list(&mut self) -> Result<Vec<Filter>> {
        let mut list = Vec::new();
        while self.peek() == Some('(') {
            list.push(self.filter()?);
        }
        Ok(list)
    }

    fn item(&mut self) -> Result<Filter> {
        let mut attr = String::new();
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '>' | '<' | '~' | ')') {
                break;
            }
            attr.push(c);
            self.pos += 1;
        }
        let op = match self.peek() {
            Some('=') => {
                self.pos += 1;
                '='
            }
            Some(c @ ('>' | '<' | '~')) => {
                self.pos += 1;
                self.expect('=')?;
                c
            }
            _ => return Err(self.error("expected operator")),
        };

        let mut raw = String::new();
        while let Some(c) = self.peek() {
            if c == ')' {
                break;
            }
            raw.push(c);
            self.pos += 1;
        }
        let attr = attr.trim().to_string();

        Ok(match op {
            '>' => Filter::GreaterOrEqual(attr, unescape(&raw)?),
            '<' => Filter::LessOrEqual(attr, unescape(&raw)?),
            '~' => Filter::Equal(attr, unescape(&raw)?),
            _ if raw == "*" => Filter::Present(attr),
            _ if raw.contains('*') => {
                let parts = raw.split('*').map(unescape).collect::<Result<Vec<_>>>()?;
                Filter::Substring(attr, parts)
            }
            _ => Filter::Equal(attr, unescape(&raw)?),
        })
    }
}

fn unescape(raw: &str) -> Result<String> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut iter = raw.bytes();
    while let Some(b) = iter.next() {
        if b == b'\\' {
            let hex: Vec<u8> = iter.by_ref().take(2).collect();
            let hex = std::str::from_utf8(&hex).map_err(|e| Error::Other(e.to_string()))?;
            let value = u8::from_str_radix(hex, 16)
                .map_err(|_| Error::Other(format!("invalid escape \\{}", hex)))?;
            bytes.push(value);
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8(bytes).map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> DirectoryEntry {
        DirectoryEntry::new("cn=5a,ou=groups,dc=a")
            .with_attr("objectClass", ["posixGroup"])
            .with_attr("cn", ["5a"])
            .with_attr("gidNumber", ["1200"])
            .with_attr("memberUid", ["u1", "u2"])
    }

    #[test]
    fn test_filter_equality_and_presence() {
        let e = entry();
        assert!(Filter::parse("(&(objectClass=posixgroup)(cn=5a))").unwrap().matches(&e));
        assert!(Filter::parse("(memberUid=*)").unwrap().matches(&e));
        assert!(!Filter::parse("(description=*)").unwrap().matches(&e));
        assert!(Filter::parse("(!(cn=5b))").unwrap().matches(&e));
        assert!(Filter::parse("(|(cn=5b)(cn=5a))").unwrap().matches(&e));
    }

    #[test]
    fn test_filter_substring_and_ordering() {
        let e = entry();
        assert!(Filter::parse("(cn=5*)").unwrap().matches(&e));
        assert!(Filter::parse("(cn=*a)").unwrap().matches(&e));
        assert!(!Filter::parse("(cn=p_*)").unwrap().matches(&e));
        assert!(Filter::parse("(gidNumber>=1000)").unwrap().matches(&e));
        assert!(!Filter::parse("(gidNumber<=999)").unwrap().matches(&e));
    }

    #[test]
    fn test_filter_escaped_value() {
        let e = DirectoryEntry::new("cn=x,dc=a").with_attr("cn", ["a*(b)"]);
        assert!(Filter::parse("(cn=a\\2a\\28b\\29)").unwrap().matches(&e));
    }

    #[test]
    fn test_filter_rejects_garbage() {
        assert!(Filter::parse("(cn=5a").is_err());
        assert!(Filter::parse("cn=5a").is_err());
        assert!(Filter::parse("(cn=5a))").is_err());
    }

    #[test]
    fn test_search_respects_contexts() {
        let mut dir = StaticDirectory::new();
        dir.add_group("ou=groups,dc=a", "5a", ["u1"]);
        dir.add_group("ou=groups,dc=b", "5b", ["u2"]);

        let found = dir
            .search("(objectClass=posixGroup)", &["ou=groups,dc=a".to_string()], &[])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first("cn"), Some("5a"));
        assert_eq!(dir.search_count(), 1);
    }

    #[test]
    fn test_unreachable_and_failing_searches() {
        let mut dir = StaticDirectory::new();
        dir.add_group("dc=a", "5a", ["u1"]);
        dir.fail_on("(cn=5a)");

        let contexts = vec!["dc=a".to_string()];
        assert!(dir.search("(&(objectClass=posixGroup)(cn=5a))", &contexts, &[]).is_err());
        assert!(dir.search("(objectClass=posixGroup)", &contexts, &[]).is_ok());

        dir.set_unreachable(true);
        let err = dir.search("(objectClass=posixGroup)", &contexts, &[]).unwrap_err();
        assert!(err.is_directory_failure());
    }

    #[test]
    fn test_from_json_fixture() {
        let dir = StaticDirectory::from_json(
            r#"[{"dn": "cn=5a,dc=a", "attrs": {"cn": ["5a"], "memberUid": ["u1"]}}]"#,
        )
        .unwrap();
        assert_eq!(dir.entries.len(), 1);
    }
}
