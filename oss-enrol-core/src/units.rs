//! Per-teacher course categories.
//!
//! Every teacher owns one category under the teacher root. Losing the teacher
//! classification moves the category to the archive root; regaining it moves
//! it back. Categories are never deleted here.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::UnitsConfig;
use crate::context::RunContext;
use crate::db::{Category, Database, NewCategory, COMPONENT, CONTEXT_CATEGORY};
use crate::error::Result;
use crate::report::IssueKind;

/// idnumber of the category holding active teacher categories
pub const TEACHER_ROOT_IDNUMBER: &str = "enrol_oss_teachers";
/// idnumber of the category holding archived teacher categories
pub const ARCHIVE_ROOT_IDNUMBER: &str = "enrol_oss_archive";

/// Category ids of the two roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRoots {
    pub teacher_root: String,
    pub archive_root: String,
}

impl UnitRoots {
    /// Look up both roots, creating whichever is missing.
    pub fn ensure(db: &Database, config: &UnitsConfig) -> Result<Self> {
        Ok(Self {
            teacher_root: ensure_root(db, TEACHER_ROOT_IDNUMBER, &config.teacher_root)?,
            archive_root: ensure_root(db, ARCHIVE_ROOT_IDNUMBER, &config.archive_root)?,
        })
    }
}

fn ensure_root(db: &Database, idnumber: &str, name: &str) -> Result<String> {
    if let Some(category) = db.get_category_by_idnumber(idnumber)? {
        return Ok(category.id);
    }
    let id = db.create_category(&NewCategory {
        name: name.to_string(),
        idnumber: Some(idnumber.to_string()),
        ..Default::default()
    })?;
    info!("Created root category {}", name);
    Ok(id)
}

/// Where a member's category currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnitState {
    NoUnit,
    Active(Category),
    Archived(Category),
    /// Moved elsewhere by an administrator; left alone
    Detached(Category),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Created,
    Archived,
    Restored,
}

pub fn unit_state(db: &Database, roots: &UnitRoots, member: &str) -> Result<UnitState> {
    let owned = db.list_categories_owned_by(member)?;
    let under = |root: &str| {
        owned
            .iter()
            .find(|c| c.parent_id.as_deref() == Some(root))
            .cloned()
    };
    if let Some(category) = under(&roots.teacher_root) {
        return Ok(UnitState::Active(category));
    }
    if let Some(category) = under(&roots.archive_root) {
        return Ok(UnitState::Archived(category));
    }
    Ok(match owned.into_iter().next() {
        Some(category) => UnitState::Detached(category),
        None => UnitState::NoUnit,
    })
}

/// Create or restore the category of one teacher.
pub fn provision_member(ctx: &mut RunContext<'_>, roots: &UnitRoots, member: &str) -> Result<Option<Transition>> {
    let role = ctx.config.units.owner_role.as_str();
    match unit_state(ctx.db, roots, member)? {
        UnitState::NoUnit => {
            let id = ctx.db.create_category(&NewCategory {
                name: member.to_string(),
                parent_id: Some(roots.teacher_root.clone()),
                owner: Some(member.to_string()),
                ..Default::default()
            })?;
            ctx.db.assign_role(role, CONTEXT_CATEGORY, &id, member, COMPONENT)?;
            ctx.report.counters.units_created += 1;
            info!("Created category for teacher {}", member);
            Ok(Some(Transition::Created))
        }
        UnitState::Archived(category) => {
            ctx.db.move_category(&category.id, &roots.teacher_root)?;
            ctx.db.assign_role(role, CONTEXT_CATEGORY, &category.id, member, COMPONENT)?;
            ctx.report.counters.units_restored += 1;
            info!("Restored category {} for teacher {}", category.name, member);
            Ok(Some(Transition::Restored))
        }
        UnitState::Active(_) => Ok(None),
        UnitState::Detached(category) => {
            debug!("Category {} of {} lives outside the managed roots", category.name, member);
            Ok(None)
        }
    }
}

/// Move a category to the archive root and drop its ownership role.
pub fn archive_unit(ctx: &mut RunContext<'_>, roots: &UnitRoots, category: &Category) -> Result<Transition> {
    ctx.db.move_category(&category.id, &roots.archive_root)?;
    if let Some(owner) = category.owner.as_deref() {
        ctx.db.unassign_role(
            &ctx.config.units.owner_role,
            CONTEXT_CATEGORY,
            &category.id,
            owner,
            COMPONENT,
        )?;
    }
    ctx.report.counters.units_archived += 1;
    info!("Archived category {}", category.name);
    Ok(Transition::Archived)
}

/// Apply all pending transitions for this run.
pub fn provision_units(ctx: &mut RunContext<'_>) -> Result<Vec<Transition>> {
    let Some(roots) = ctx.units.clone() else {
        return Ok(Vec::new());
    };
    let mut transitions = Vec::new();

    let teachers: Vec<String> = ctx.roles.provisionable().cloned().collect();
    for member in &teachers {
        match provision_member(ctx, &roots, member) {
            Ok(Some(t)) => transitions.push(t),
            Ok(None) => {}
            Err(e) => ctx.report.record_error(format!("category of {}", member), &e),
        }
    }

    for category in ctx.db.list_child_categories(&roots.teacher_root)? {
        let Some(owner) = category.owner.clone() else {
            continue;
        };
        if ctx.roles.is_teacher(&owner) && !ctx.roles.is_ignored(&owner) {
            continue;
        }
        match archive_unit(ctx, &roots, &category) {
            Ok(t) => transitions.push(t),
            Err(e) => ctx.report.record_error(format!("category {}", category.name), &e),
        }
    }

    report_duplicates(ctx, &roots.teacher_root)?;

    if !transitions.is_empty() {
        resequence(ctx, &roots.teacher_root)?;
    }
    Ok(transitions)
}

/// One-off consistency pass over the managed categories.
///
/// Adopts ownerless categories named after a teacher, restores missing
/// ownership roles and re-sequences both roots. Duplicates are reported,
/// never merged.
pub fn repair_units(ctx: &mut RunContext<'_>) -> Result<()> {
    let Some(roots) = ctx.units.clone() else {
        ctx.report.record(
            IssueKind::ConfigurationDisabled,
            "repair",
            "unit provisioning is disabled",
        );
        return Ok(());
    };
    let role = ctx.config.units.owner_role.clone();

    for category in ctx.db.list_child_categories(&roots.teacher_root)? {
        match category.owner.as_deref() {
            None => {
                let name = category.name.to_lowercase();
                let eligible = ctx.roles.is_teacher(&name) && !ctx.roles.is_ignored(&name);
                if eligible && unit_state(ctx.db, &roots, &name)? == UnitState::NoUnit {
                    ctx.db.set_category_owner(&category.id, Some(&name))?;
                    ctx.db.assign_role(&role, CONTEXT_CATEGORY, &category.id, &name, COMPONENT)?;
                    ctx.report.counters.units_adopted += 1;
                    info!("Adopted category {} for teacher {}", category.name, name);
                }
            }
            Some(owner) => {
                if ctx.roles.is_teacher(owner)
                    && !ctx.roles.is_ignored(owner)
                    && ctx.db.assign_role(&role, CONTEXT_CATEGORY, &category.id, owner, COMPONENT)?
                {
                    ctx.report.counters.roles_assigned += 1;
                    info!("Restored {} role of {} on {}", role, owner, category.name);
                }
            }
        }
    }

    report_duplicates(ctx, &roots.teacher_root)?;
    resequence(ctx, &roots.teacher_root)?;
    resequence(ctx, &roots.archive_root)?;
    Ok(())
}

/// Warn about category names occurring more than once under `parent_id`.
fn report_duplicates(ctx: &mut RunContext<'_>, parent_id: &str) -> Result<()> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for category in ctx.db.list_child_categories(parent_id)? {
        *counts.entry(category.name.to_lowercase()).or_default() += 1;
    }
    for (name, count) in counts.into_iter().filter(|(_, c)| *c > 1) {
        ctx.report.record(
            IssueKind::DuplicateUnit,
            format!("category {}", name),
            format!("{} categories share this name under the teacher root", count),
        );
    }
    Ok(())
}

/// Renumber the children of `parent_id` alphabetically, starting at 1.
/// Children already in that order are left untouched.
fn resequence(ctx: &mut RunContext<'_>, parent_id: &str) -> Result<()> {
    let mut children = ctx.db.list_child_categories(parent_id)?;
    children.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    if children.iter().zip(1..).all(|(c, n)| c.sort_order == n) {
        return Ok(());
    }
    let ids: Vec<String> = children.into_iter().map(|c| c.id).collect();
    ctx.db.resequence_categories(&ids)?;
    ctx.report.counters.units_resequenced += 1;
    debug!("Resequenced {} categories", ids.len());
    Ok(())
}
