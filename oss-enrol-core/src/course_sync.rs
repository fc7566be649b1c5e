//! Course to cohort enrolment instances.
//!
//! A course lists the groups it enrols in its idnumber, encoded as
//! `shortname:token1,token2`. Every listed group gets one enrolment instance
//! owned by this engine; instances whose group was dropped from the list are
//! removed together with their user enrolments.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::cohort_sync::compute_membership_diff;
use crate::context::RunContext;
use crate::db::{Course, NewEnrolInstance, COMPONENT};
use crate::error::{Error, Result};
use crate::report::IssueKind;

/// Parsed course idnumber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseMapping {
    pub shortname: String,
    pub tokens: Vec<String>,
}

impl CourseMapping {
    /// Parse an idnumber in any of the accepted forms.
    ///
    /// `token`, `t1,t2` and `oldshort:t1,t2` are all read as a token list
    /// for `shortname`. Returns `None` when no token remains.
    ///
    /// Shortnames may contain `:` themselves, so the current shortname prefix
    /// is stripped as a whole and any other prefix ends at the last `:`.
    pub fn parse(shortname: &str, idnumber: &str) -> Option<Self> {
        let current = format!("{}:", shortname);
        let list = match idnumber.strip_prefix(current.as_str()) {
            Some(rest) => rest,
            None => idnumber.rsplit_once(':').map_or(idnumber, |(_, rest)| rest),
        };
        let mut tokens: Vec<String> = Vec::new();
        for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
        if tokens.is_empty() {
            return None;
        }
        Some(Self {
            shortname: shortname.to_string(),
            tokens,
        })
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.shortname, self.tokens.join(","))
    }
}

/// Outcome of syncing one course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourseChange {
    /// New idnumber if the stored one was rewritten
    pub migrated: Option<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl CourseChange {
    pub fn instances_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Bring the enrolment instances of `course` in line with its idnumber.
pub fn sync_course(ctx: &mut RunContext<'_>, course: &Course) -> Result<CourseChange> {
    let mut change = CourseChange::default();
    let mapping = CourseMapping::parse(&course.shortname, &course.idnumber);

    if let Some(mapping) = &mapping {
        let encoded = mapping.encode();
        if encoded != course.idnumber {
            ctx.db.update_course_idnumber(&course.id, &encoded)?;
            ctx.report.counters.idnumbers_migrated += 1;
            info!("Migrated idnumber of {}: {:?} -> {:?}", course.shortname, course.idnumber, encoded);
            change.migrated = Some(encoded);
        }
    }
    let tokens: Vec<String> = mapping.map(|m| m.tokens).unwrap_or_default();

    let instances = ctx.db.list_enrol_instances(&course.id)?;

    for instance in instances.iter().filter(|i| i.is_owned()) {
        if !tokens.contains(&instance.token) {
            ctx.db.delete_enrol_instance(&instance.id)?;
            ctx.report.counters.instances_deleted += 1;
            info!("Removed enrolment of {} from {}", instance.token, course.shortname);
            change.removed.push(instance.token.clone());
        }
    }

    for token in &tokens {
        if let Some(existing) = instances.iter().find(|i| &i.token == token) {
            if !existing.is_owned() {
                ctx.report.record(
                    IssueKind::ForeignRecord,
                    format!("course {}", course.shortname),
                    format!("enrolment of {} belongs to {}", token, existing.component),
                );
            }
            continue;
        }
        let Some(cohort) = ctx.db.get_cohort_by_idnumber(token)? else {
            ctx.report.record(
                IssueKind::UnknownGroup,
                format!("course {}", course.shortname),
                format!("group {} does not exist", token),
            );
            continue;
        };
        let role = if ctx.naming.is_teacher_eligible(token) {
            ctx.config.enrol.teacher_role.clone()
        } else {
            ctx.config.enrol.student_role.clone()
        };
        ctx.db.create_enrol_instance(&NewEnrolInstance {
            course_id: course.id.clone(),
            cohort_id: cohort.id,
            token: token.clone(),
            role,
            component: COMPONENT.to_string(),
        })?;
        ctx.report.counters.instances_created += 1;
        info!("Enrolled group {} in {}", token, course.shortname);
        change.added.push(token.clone());
    }

    if change.instances_changed() {
        sync_enrolments(ctx, &course.id)?;
    }
    Ok(change)
}

/// Make the user enrolments of each owned instance equal its cohort members.
pub fn sync_enrolments(ctx: &mut RunContext<'_>, course_id: &str) -> Result<()> {
    for instance in ctx.db.list_enrol_instances(course_id)? {
        if !instance.is_owned() {
            continue;
        }
        let wanted = ctx.db.list_cohort_members(&instance.cohort_id)?;
        let current: BTreeSet<String> = ctx.db.list_user_enrolments(&instance.id)?;
        let diff = compute_membership_diff(&wanted, &current);

        for member in &diff.to_remove {
            if ctx.db.unenrol_user(&instance.id, member)? {
                ctx.report.counters.enrolments_removed += 1;
            }
        }
        for member in &diff.to_add {
            if ctx.db.enrol_user(&instance.id, member)? {
                ctx.report.counters.enrolments_added += 1;
            }
        }
        if !diff.to_add.is_empty() || !diff.to_remove.is_empty() {
            debug!(
                "Enrolments of {} in course {}: +{} -{}",
                instance.token,
                course_id,
                diff.to_add.len(),
                diff.to_remove.len()
            );
        }
    }
    Ok(())
}

/// Sync every course, then refresh every course's enrolments.
pub fn sync_courses(ctx: &mut RunContext<'_>) -> Result<()> {
    let courses = ctx.db.list_courses()?;
    info!("Syncing {} courses", courses.len());
    sync_each(ctx, &courses);
    Ok(())
}

/// Sync the courses of one category.
pub fn sync_category(ctx: &mut RunContext<'_>, category_id: &str) -> Result<()> {
    let category = ctx
        .db
        .get_category(category_id)?
        .ok_or_else(|| Error::CategoryNotFound(category_id.to_string()))?;
    let courses = ctx.db.list_courses_in_category(&category.id)?;
    info!("Syncing {} courses in {}", courses.len(), category.name);
    sync_each(ctx, &courses);
    Ok(())
}

fn sync_each(ctx: &mut RunContext<'_>, courses: &[Course]) {
    for course in courses {
        if let Err(e) = sync_course(ctx, course) {
            ctx.report.record_error(format!("course {}", course.shortname), &e);
        }
    }
    // group membership may have moved since the instances were created
    for course in courses {
        if let Err(e) = sync_enrolments(ctx, &course.id) {
            ctx.report.record_error(format!("enrolments of {}", course.shortname), &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort_sync::reconcile_group;
    use crate::db::{Database, NewCategory, NewCourse};
    use crate::directory::StaticDirectory;
    use crate::testing::{context, test_config, CONTEXT};

    fn course(db: &Database, shortname: &str, idnumber: &str) -> Course {
        let id = db
            .create_course(&NewCourse {
                shortname: shortname.into(),
                fullname: shortname.to_uppercase(),
                idnumber: idnumber.into(),
                ..Default::default()
            })
            .unwrap();
        db.get_course(&id).unwrap().unwrap()
    }

    fn tokens(mapping: Option<CourseMapping>) -> Vec<String> {
        mapping.map(|m| m.tokens).unwrap_or_default()
    }

    #[test]
    fn test_parse_forms() {
        let m = CourseMapping::parse("math", "5a").unwrap();
        assert_eq!(m.encode(), "math:5a");

        let m = CourseMapping::parse("math", "5a, 5b").unwrap();
        assert_eq!(m.encode(), "math:5a,5b");

        let m = CourseMapping::parse("math2", "math:5a,5b").unwrap();
        assert_eq!(m.encode(), "math2:5a,5b");

        assert_eq!(tokens(CourseMapping::parse("math", " 5a,,5b , 5a ")), vec!["5a", "5b"]);
        assert!(CourseMapping::parse("math", "").is_none());
        assert!(CourseMapping::parse("math", "math: , ").is_none());
    }

    #[test]
    fn test_parse_shortname_with_colon() {
        let m = CourseMapping::parse("bio:2024", "bio:2024:5a,5b").unwrap();
        assert_eq!(m.tokens, vec!["5a", "5b"]);
        assert_eq!(m.encode(), "bio:2024:5a,5b");

        // renamed course with a colon in the old shortname
        let m = CourseMapping::parse("bio", "bio:2023:5a").unwrap();
        assert_eq!(m.encode(), "bio:5a");
    }

    #[test]
    fn test_colon_shortname_settles_after_one_pass() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        let mut dir = StaticDirectory::new();
        dir.add_group(CONTEXT, "5a", ["u1"]);
        let c = course(&db, "bio:2024", "5a");

        let mut ctx = context(&config, &db, &mut dir);
        reconcile_group(&mut ctx, "5a").unwrap();
        for _ in 0..3 {
            let c = db.get_course(&c.id).unwrap().unwrap();
            sync_course(&mut ctx, &c).unwrap();
        }

        assert_eq!(db.get_course(&c.id).unwrap().unwrap().idnumber, "bio:2024:5a");
        assert_eq!(ctx.report.counters.idnumbers_migrated, 1);
        assert_eq!(ctx.report.issues_of(IssueKind::UnknownGroup).count(), 0);
        assert_eq!(db.list_enrol_instances(&c.id).unwrap().len(), 1);
    }

    #[test]
    fn test_legacy_idnumber_migrated_once() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        let mut dir = StaticDirectory::new();
        let c = course(&db, "math", "onlytoken");

        let mut ctx = context(&config, &db, &mut dir);
        let change = sync_course(&mut ctx, &c).unwrap();
        assert_eq!(change.migrated.as_deref(), Some("math:onlytoken"));
        assert_eq!(ctx.report.issues_of(IssueKind::UnknownGroup).count(), 1);

        let c = db.get_course(&c.id).unwrap().unwrap();
        assert_eq!(c.idnumber, "math:onlytoken");
        let change = sync_course(&mut ctx, &c).unwrap();
        assert!(change.migrated.is_none());
        assert_eq!(ctx.report.counters.idnumbers_migrated, 1);
    }

    #[test]
    fn test_instances_created_with_roles() {
        let mut config = test_config();
        config.naming.teacher_eligible_groups = vec!["classB".to_string()];
        let db = Database::open_in_memory().unwrap();
        let mut dir = StaticDirectory::new();
        dir.add_group(CONTEXT, "classA", ["u1", "u2"]);
        dir.add_group(CONTEXT, "classB", ["u3"]);
        let c = course(&db, "math101", "math101:classA,classB");

        let mut ctx = context(&config, &db, &mut dir);
        reconcile_group(&mut ctx, "classA").unwrap();
        reconcile_group(&mut ctx, "classB").unwrap();
        let change = sync_course(&mut ctx, &c).unwrap();
        assert_eq!(change.added, vec!["classA", "classB"]);

        let instances = db.list_enrol_instances(&c.id).unwrap();
        assert_eq!(instances.len(), 2);
        let role_of = |token: &str| {
            instances
                .iter()
                .find(|i| i.token == token)
                .map(|i| i.role.clone())
                .unwrap()
        };
        assert_eq!(role_of("classA"), "student");
        assert_eq!(role_of("classB"), "editingteacher");

        let a = instances.iter().find(|i| i.token == "classA").unwrap();
        let enrolled = db.list_user_enrolments(&a.id).unwrap();
        assert_eq!(enrolled.into_iter().collect::<Vec<_>>(), vec!["u1", "u2"]);

        let again = sync_course(&mut ctx, &c).unwrap();
        assert_eq!(again, CourseChange::default());
    }

    #[test]
    fn test_dropped_token_removes_instance() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        let mut dir = StaticDirectory::new();
        dir.add_group(CONTEXT, "5a", ["u1"]);
        dir.add_group(CONTEXT, "5b", ["u2"]);
        let c = course(&db, "art", "art:5a,5b");

        let mut ctx = context(&config, &db, &mut dir);
        reconcile_group(&mut ctx, "5a").unwrap();
        reconcile_group(&mut ctx, "5b").unwrap();
        sync_course(&mut ctx, &c).unwrap();

        db.update_course_idnumber(&c.id, "art:5a").unwrap();
        let c = db.get_course(&c.id).unwrap().unwrap();
        let change = sync_course(&mut ctx, &c).unwrap();

        assert_eq!(change.removed, vec!["5b"]);
        let instances = db.list_enrol_instances(&c.id).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].token, "5a");
    }

    #[test]
    fn test_foreign_instance_left_alone() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        let mut dir = StaticDirectory::new();
        dir.add_group(CONTEXT, "5a", ["u1"]);
        let c = course(&db, "art", "art:5a");

        let mut ctx = context(&config, &db, &mut dir);
        reconcile_group(&mut ctx, "5a").unwrap();
        let cohort = db.get_cohort_by_idnumber("5a").unwrap().unwrap();
        db.create_enrol_instance(&NewEnrolInstance {
            course_id: c.id.clone(),
            cohort_id: cohort.id,
            token: "5a".into(),
            role: "student".into(),
            component: "manual".into(),
        })
        .unwrap();

        let change = sync_course(&mut ctx, &c).unwrap();
        assert!(change.added.is_empty());
        assert_eq!(ctx.report.issues_of(IssueKind::ForeignRecord).count(), 1);
        assert_eq!(db.list_enrol_instances(&c.id).unwrap().len(), 1);
    }

    #[test]
    fn test_enrolments_follow_cohort() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        let mut dir = StaticDirectory::new();
        dir.add_group(CONTEXT, "5a", ["u1", "u2"]);
        let c = course(&db, "art", "art:5a");
        {
            let mut ctx = context(&config, &db, &mut dir);
            reconcile_group(&mut ctx, "5a").unwrap();
            sync_course(&mut ctx, &c).unwrap();
        }

        dir.set_members("5a", ["u2", "u3"]);
        let mut ctx = context(&config, &db, &mut dir);
        reconcile_group(&mut ctx, "5a").unwrap();
        sync_courses(&mut ctx).unwrap();

        let instance = db.list_enrol_instances(&c.id).unwrap().remove(0);
        let enrolled: Vec<String> = db.list_user_enrolments(&instance.id).unwrap().into_iter().collect();
        assert_eq!(enrolled, vec!["u2", "u3"]);
        assert_eq!(ctx.report.counters.enrolments_added, 1);
        assert_eq!(ctx.report.counters.enrolments_removed, 1);
    }

    #[test]
    fn test_sync_category() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        let mut dir = StaticDirectory::new();
        let category = db
            .create_category(&NewCategory {
                name: "Science".into(),
                ..Default::default()
            })
            .unwrap();
        db.create_course(&NewCourse {
            shortname: "bio".into(),
            fullname: "Biology".into(),
            category_id: Some(category.clone()),
            idnumber: "5a".into(),
        })
        .unwrap();
        let other = course(&db, "art", "5a");

        let mut ctx = context(&config, &db, &mut dir);
        sync_category(&mut ctx, &category).unwrap();
        assert_eq!(ctx.report.counters.idnumbers_migrated, 1);
        assert_eq!(db.get_course(&other.id).unwrap().unwrap().idnumber, "5a");

        let err = sync_category(&mut ctx, "missing").unwrap_err();
        assert!(matches!(err, Error::CategoryNotFound(_)));
    }
}
