//! Command implementations for oss-enrol CLI.
//!
//! `run` drives the sync tasks, `report` prints their results and `doctor`
//! checks the environment without writing anything.

pub mod doctor;
pub mod report;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use oss_enrol_core::config::DirectoryConfig;
#[cfg(feature = "ldap")]
use oss_enrol_core::LdapDirectory;
use oss_enrol_core::{Database, DirectoryClient, StaticDirectory};
use oss_enrol_core::directory::DirectoryEntry;

use crate::config::Config;
use crate::error::CliError;

/// Directory behind a run: the LDAP server or a JSON fixture.
pub enum Source {
    #[cfg(feature = "ldap")]
    Ldap(LdapDirectory),
    Fixture(StaticDirectory),
}

impl DirectoryClient for Source {
    fn search(
        &mut self,
        filter: &str,
        contexts: &[String],
        attrs: &[&str],
    ) -> oss_enrol_core::Result<Vec<DirectoryEntry>> {
        match self {
            #[cfg(feature = "ldap")]
            Source::Ldap(dir) => dir.search(filter, contexts, attrs),
            Source::Fixture(dir) => dir.search(filter, contexts, attrs),
        }
    }
}

impl Source {
    /// Load the fixture if one is given, else connect to LDAP.
    pub fn connect(directory: &DirectoryConfig, fixture: Option<&Path>) -> oss_enrol_core::Result<Self> {
        if let Some(path) = fixture {
            let content = std::fs::read_to_string(path)?;
            return Ok(Source::Fixture(StaticDirectory::from_json(&content)?));
        }
        Self::connect_ldap(directory)
    }

    #[cfg(feature = "ldap")]
    fn connect_ldap(directory: &DirectoryConfig) -> oss_enrol_core::Result<Self> {
        Ok(Source::Ldap(LdapDirectory::connect(directory)?))
    }

    #[cfg(not(feature = "ldap"))]
    fn connect_ldap(_directory: &DirectoryConfig) -> oss_enrol_core::Result<Self> {
        Err(oss_enrol_core::Error::Config(
            "built without LDAP support; pass --fixture".to_string(),
        ))
    }
}

/// Check the fixture path up front so a typo fails before the database opens.
pub fn check_fixture(fixture: Option<&Path>) -> Result<()> {
    match fixture {
        Some(path) if !path.is_file() => Err(CliError::Fixture(format!("{} not found", path.display())).into()),
        _ => Ok(()),
    }
}

pub fn open_database(config: &Config) -> Result<Database> {
    config.ensure_dirs()?;
    Database::open_path(&config.database.path)
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))
}
