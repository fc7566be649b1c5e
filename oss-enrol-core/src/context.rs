//! Run-scoped context.
//!
//! Everything a run needs is resolved once at run start and passed to each
//! operation: the configuration, the store, the directory connection, the
//! teacher roster, the compiled naming rules and the category roots.

use crate::config::SyncConfig;
use crate::db::Database;
use crate::directory::{DirectoryClient, GroupQuery};
use crate::error::Result;
use crate::naming::GroupNaming;
use crate::report::RunReport;
use crate::roles::RoleClassifier;
use crate::units::UnitRoots;

pub struct RunContext<'a> {
    pub config: &'a SyncConfig,
    pub db: &'a Database,
    pub directory: &'a mut dyn DirectoryClient,
    pub roles: RoleClassifier,
    pub naming: GroupNaming,
    /// Category roots; `None` when unit provisioning is disabled
    pub units: Option<UnitRoots>,
    pub report: RunReport,
}

impl<'a> RunContext<'a> {
    /// Load the teacher roster and category roots for a new run.
    pub fn prepare(
        task: &str,
        config: &'a SyncConfig,
        db: &'a Database,
        directory: &'a mut dyn DirectoryClient,
    ) -> Result<Self> {
        let naming = GroupNaming::new(config)?;
        let roles = RoleClassifier::load(&mut *directory, config)?;
        let units = if config.units.enabled {
            Some(UnitRoots::ensure(db, &config.units)?)
        } else {
            None
        };

        Ok(Self {
            config,
            db,
            directory,
            roles,
            naming,
            units,
            report: RunReport::new(task),
        })
    }

    /// Group query bound to this run's directory settings.
    pub fn query(&self) -> GroupQuery<'a> {
        let config: &'a SyncConfig = self.config;
        GroupQuery::new(&config.directory)
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }
}
