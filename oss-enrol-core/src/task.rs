//! Runnable sync tasks.
//!
//! A task is one entry point into the engine. `run_task` does the shared
//! work around it: the enabled check, configuration validation, acquiring
//! the directory connection and building the run context.

use tracing::{debug, info};

use crate::cohort_sync::sync_groups;
use crate::config::SyncConfig;
use crate::context::RunContext;
use crate::course_sync::{sync_category, sync_course, sync_courses, sync_enrolments};
use crate::db::Database;
use crate::directory::DirectoryClient;
use crate::error::{Error, Result};
use crate::report::RunReport;
use crate::units::{provision_units, repair_units};

pub trait SyncTask {
    fn name(&self) -> &'static str;

    /// Run the task. Errors returned here abort the run; per-entity
    /// failures are recorded in `ctx.report` instead.
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<()>;
}

/// Groups, then teacher categories, then course enrolments.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullSync;

impl SyncTask for FullSync {
    fn name(&self) -> &'static str {
        "sync"
    }

    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        sync_groups(ctx)?;
        if let Err(e) = provision_units(ctx) {
            ctx.report.record_error("teacher categories", &e);
        }
        sync_courses(ctx)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairUnits;

impl SyncTask for RepairUnits {
    fn name(&self) -> &'static str {
        "repair-units"
    }

    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        repair_units(ctx)
    }
}

#[derive(Debug, Clone)]
pub struct CourseSync {
    pub course_id: String,
}

impl SyncTask for CourseSync {
    fn name(&self) -> &'static str {
        "sync-course"
    }

    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        // accept either the id or the shortname
        let course = match ctx.db.get_course(&self.course_id)? {
            Some(course) => course,
            None => ctx
                .db
                .get_course_by_shortname(&self.course_id)?
                .ok_or_else(|| Error::CourseNotFound(self.course_id.clone()))?,
        };
        let change = sync_course(ctx, &course)?;
        if !change.instances_changed() {
            sync_enrolments(ctx, &course.id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CategorySync {
    pub category_id: String,
}

impl SyncTask for CategorySync {
    fn name(&self) -> &'static str {
        "sync-category"
    }

    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<()> {
        sync_category(ctx, &self.category_id)
    }
}

/// Run `task` against `db` and the directory returned by `connect`.
///
/// A disabled engine yields a skipped report without connecting. The
/// connection lives until the task returns.
pub fn run_task<D, F>(task: &dyn SyncTask, config: &SyncConfig, db: &Database, connect: F) -> Result<RunReport>
where
    D: DirectoryClient,
    F: FnOnce() -> Result<D>,
{
    if let Some(reason) = config.disabled_reason() {
        let mut report = RunReport::new(task.name());
        report.skip(reason);
        return Ok(report.finish());
    }
    config.validate()?;
    db.ping()?;

    info!("Starting {}", task.name());
    let mut directory = connect()?;
    debug!("Directory connection established");

    let mut ctx = RunContext::prepare(task.name(), config, db, &mut directory)?;
    task.execute(&mut ctx)?;
    Ok(ctx.into_report().finish())
}
