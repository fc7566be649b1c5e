//! Group membership sync.
//!
//! Mirrors directory groups into local cohorts. Each group is reconciled on
//! its own: a directory failure or a failed write abandons that group only,
//! and since removals and additions are computed from a fresh diff every
//! time, rerunning picks up where the last run stopped.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::course_sync::CourseMapping;
use crate::db::{Cohort, NewCohort, COMPONENT};
use crate::error::{Error, Result};

/// Outcome of reconciling one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipChange {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    /// The local cohort was created by this call
    pub created: bool,
    /// The local cohort was deleted by this call
    pub deleted: bool,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.created && !self.deleted
    }
}

/// Members to add and remove so that `local` becomes `wanted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDiff {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

pub fn compute_membership_diff(wanted: &BTreeSet<String>, local: &BTreeSet<String>) -> MembershipDiff {
    MembershipDiff {
        to_add: wanted.difference(local).cloned().collect(),
        to_remove: local.difference(wanted).cloned().collect(),
    }
}

/// Bring the local cohort for `group` in line with the directory.
pub fn reconcile_group(ctx: &mut RunContext<'_>, group: &str) -> Result<MembershipChange> {
    reconcile(ctx, group, &mut None)
}

/// `mapped` caches the lowercased tokens of every course mapping. It is
/// filled on first use and may be shared across one pass over the groups.
fn reconcile(ctx: &mut RunContext<'_>, group: &str, mapped: &mut Option<BTreeSet<String>>) -> Result<MembershipChange> {
    let query = ctx.query();
    let directory_members = query
        .fetch(&mut *ctx.directory, group)?
        .map(|g| g.members)
        .unwrap_or_default();

    let eligible = ctx.naming.is_teacher_eligible(group);
    let wanted: BTreeSet<String> = directory_members
        .into_iter()
        .filter(|m| eligible || !ctx.roles.is_teacher(m))
        .collect();

    let mut change = MembershipChange::default();

    let cohort = match ctx.db.get_cohort_by_idnumber(group)? {
        Some(cohort) if !cohort.is_owned() => {
            return Err(Error::ForeignRecord(format!("cohort {} ({})", group, cohort.component)));
        }
        Some(cohort) => cohort,
        // nothing to mirror and nothing to clean up
        None if wanted.is_empty() => return Ok(change),
        None => {
            let cohort = create_cohort(ctx, group)?;
            change.created = true;
            cohort
        }
    };

    let display_name = ctx.naming.display_name(group);
    if !change.created && cohort.name != display_name {
        ctx.db.update_cohort_name(&cohort.id, &display_name)?;
        ctx.report.counters.groups_renamed += 1;
    }

    let local = ctx.db.list_cohort_members(&cohort.id)?;
    let diff = compute_membership_diff(&wanted, &local);

    for member in diff.to_remove {
        if ctx.db.remove_cohort_member(&cohort.id, &member)? {
            ctx.report.counters.members_removed += 1;
            change.removed.insert(member);
        }
    }
    for member in diff.to_add {
        if ctx.db.add_cohort_member(&cohort.id, &member)? {
            ctx.report.counters.members_added += 1;
            change.added.insert(member);
        }
    }

    if wanted.is_empty() {
        if is_referenced(ctx, &cohort, mapped)? {
            debug!("Keeping empty cohort {}: still referenced by a course", group);
        } else {
            ctx.db.delete_cohort(&cohort.id)?;
            ctx.report.counters.groups_deleted += 1;
            change.deleted = true;
            info!("Deleted empty cohort {}", group);
        }
    }

    if !change.is_empty() {
        info!(
            "Group {}: +{} -{}",
            group,
            change.added.len(),
            change.removed.len()
        );
    }
    Ok(change)
}

/// Reconcile every directory group plus every locally owned cohort.
///
/// Groups that disappeared from the directory are still visited so their
/// cohorts are drained. If the group listing itself fails the phase is
/// skipped; no cohort is touched on the strength of a partial answer.
pub fn sync_groups(ctx: &mut RunContext<'_>) -> Result<()> {
    let query = ctx.query();
    let listed = match query.list_names(&mut *ctx.directory) {
        Ok(names) => names,
        Err(e) if e.is_directory_failure() => {
            ctx.report.record_error("group listing", &e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    // group names compare case-insensitively
    let mut names: BTreeMap<String, String> = listed.into_iter().map(|n| (n.to_lowercase(), n)).collect();
    for cohort in ctx.db.list_cohorts_by_component(COMPONENT)? {
        names.entry(cohort.idnumber.to_lowercase()).or_insert(cohort.idnumber);
    }

    info!("Reconciling {} groups", names.len());
    let mut mapped = None;
    for name in names.values() {
        if let Err(e) = reconcile(ctx, name, &mut mapped) {
            ctx.report.record_error(format!("group {}", name), &e);
        }
    }
    Ok(())
}

fn create_cohort(ctx: &mut RunContext<'_>, group: &str) -> Result<Cohort> {
    let name = ctx.naming.display_name(group);
    ctx.db.create_cohort(&NewCohort {
        idnumber: group.to_string(),
        name,
        component: COMPONENT.to_string(),
    })?;
    ctx.report.counters.groups_created += 1;
    info!("Created cohort {}", group);
    ctx.db
        .get_cohort_by_idnumber(group)?
        .ok_or_else(|| Error::write_failure(format!("cohort {}", group), "created row not found"))
}

/// A cohort is referenced while an enrolment instance is bound to it or a
/// course mapping still lists it.
fn is_referenced(ctx: &RunContext<'_>, cohort: &Cohort, mapped: &mut Option<BTreeSet<String>>) -> Result<bool> {
    if ctx.db.count_enrol_instances_for_cohort(&cohort.id)? > 0 {
        return Ok(true);
    }
    if mapped.is_none() {
        *mapped = Some(mapped_tokens(ctx)?);
    }
    Ok(mapped
        .as_ref()
        .is_some_and(|tokens| tokens.contains(&cohort.idnumber.to_lowercase())))
}

fn mapped_tokens(ctx: &RunContext<'_>) -> Result<BTreeSet<String>> {
    let courses = ctx.db.list_courses()?;
    debug!("Collecting group references from {} courses", courses.len());
    Ok(courses
        .iter()
        .filter_map(|course| CourseMapping::parse(&course.shortname, &course.idnumber))
        .flat_map(|m| m.tokens)
        .map(|t| t.to_lowercase())
        .collect())
}
