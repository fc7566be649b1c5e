//! Local membership store on SQLite.
//!
//! Holds the mirrored cohorts and their members, course categories, courses,
//! enrolment instances and role assignments. The schema is embedded and
//! applied on every open.
//!
//! Database location priority (resolved by the CLI):
//! 1. `--database` flag
//! 2. OSS_ENROL_DATABASE_PATH env var
//! 3. `[database] path` from the configuration file

pub mod types;

pub use types::*;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

/// Embedded schema
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database connection wrapper.
///
/// All database operations acquire the internal lock. Every write is a single
/// statement or its own transaction.
pub struct Database {
    conn: Mutex<Connection>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Database {
    /// Open database at specific path, creating the schema if needed
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::Database)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch("SELECT 1").map_err(Error::Database)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cohort Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get cohort by directory name
    pub fn get_cohort_by_idnumber(&self, idnumber: &str) -> Result<Option<Cohort>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, idnumber, name, component, created_at, updated_at
             FROM cohort WHERE idnumber = ?1 COLLATE NOCASE",
        )?;
        Ok(stmt.query_row(params![idnumber], Self::map_cohort).optional()?)
    }

    /// List cohorts carrying the given origin marker
    pub fn list_cohorts_by_component(&self, component: &str) -> Result<Vec<Cohort>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, idnumber, name, component, created_at, updated_at
             FROM cohort WHERE component = ?1 ORDER BY idnumber",
        )?;
        let cohorts = stmt
            .query_map(params![component], Self::map_cohort)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cohorts)
    }

    fn map_cohort(row: &rusqlite::Row) -> rusqlite::Result<Cohort> {
        Ok(Cohort {
            id: row.get(0)?,
            idnumber: row.get(1)?,
            name: row.get(2)?,
            component: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    /// Create a new cohort
    pub fn create_cohort(&self, cohort: &NewCohort) -> Result<String> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();
        conn.execute(
            "INSERT INTO cohort (id, idnumber, name, component, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, cohort.idnumber, cohort.name, cohort.component, now],
        )?;
        Ok(id)
    }

    /// Update cohort display name
    pub fn update_cohort_name(&self, cohort_id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "UPDATE cohort SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, now_millis(), cohort_id],
        )?;
        Ok(())
    }

    /// Delete a cohort together with its member rows
    pub fn delete_cohort(&self, cohort_id: &str) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM cohort_member WHERE cohort_id = ?1", params![cohort_id])?;
        tx.execute("DELETE FROM cohort WHERE id = ?1", params![cohort_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Members of a cohort
    pub fn list_cohort_members(&self, cohort_id: &str) -> Result<BTreeSet<String>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare("SELECT member FROM cohort_member WHERE cohort_id = ?1")?;
        let members = stmt
            .query_map(params![cohort_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(members)
    }

    /// Add a member; returns false if already present
    pub fn add_cohort_member(&self, cohort_id: &str, member: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO cohort_member (cohort_id, member, added_at) VALUES (?1, ?2, ?3)",
            params![cohort_id, member, now_millis()],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a member; returns false if not present
    pub fn remove_cohort_member(&self, cohort_id: &str, member: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let deleted = conn.execute(
            "DELETE FROM cohort_member WHERE cohort_id = ?1 AND member = ?2",
            params![cohort_id, member],
        )?;
        Ok(deleted > 0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Category Operations
    // ─────────────────────────────────────────────────────────────────────────

    const CATEGORY_COLUMNS: &'static str =
        "id, name, idnumber, parent_id, owner, sort_order, created_at, updated_at";

    /// Get category by ID
    pub fn get_category(&self, category_id: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM course_category WHERE id = ?1",
            Self::CATEGORY_COLUMNS
        ))?;
        Ok(stmt.query_row(params![category_id], Self::map_category).optional()?)
    }

    /// Get category by idnumber
    pub fn get_category_by_idnumber(&self, idnumber: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM course_category WHERE idnumber = ?1",
            Self::CATEGORY_COLUMNS
        ))?;
        Ok(stmt.query_row(params![idnumber], Self::map_category).optional()?)
    }

    /// Child categories in sort order
    pub fn list_child_categories(&self, parent_id: &str) -> Result<Vec<Category>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM course_category WHERE parent_id = ?1 ORDER BY sort_order, name",
            Self::CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map(params![parent_id], Self::map_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Categories owned by a member, wherever they live
    pub fn list_categories_owned_by(&self, owner: &str) -> Result<Vec<Category>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM course_category WHERE owner = ?1 ORDER BY created_at",
            Self::CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map(params![owner], Self::map_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn map_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            idnumber: row.get(2)?,
            parent_id: row.get(3)?,
            owner: row.get(4)?,
            sort_order: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    /// Create a category, appended after its siblings
    pub fn create_category(&self, category: &NewCategory) -> Result<String> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();

        let max_order: i32 = conn.query_row(
            "SELECT COALESCE(MAX(sort_order), 0) FROM course_category WHERE parent_id IS ?1",
            params![category.parent_id],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO course_category
             (id, name, idnumber, parent_id, owner, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                category.name,
                category.idnumber,
                category.parent_id,
                category.owner,
                max_order + 1,
                now,
            ],
        )?;

        Ok(id)
    }

    /// Move a category under a new parent, appended after its new siblings
    pub fn move_category(&self, category_id: &str, parent_id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let max_order: i32 = conn.query_row(
            "SELECT COALESCE(MAX(sort_order), 0) FROM course_category WHERE parent_id = ?1",
            params![parent_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "UPDATE course_category SET parent_id = ?1, sort_order = ?2, updated_at = ?3 WHERE id = ?4",
            params![parent_id, max_order + 1, now_millis(), category_id],
        )?;
        Ok(())
    }

    /// Set or clear the owner of a category
    pub fn set_category_owner(&self, category_id: &str, owner: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "UPDATE course_category SET owner = ?1, updated_at = ?2 WHERE id = ?3",
            params![owner, now_millis(), category_id],
        )?;
        Ok(())
    }

    /// Rewrite the sort order of the given categories, in slice order starting at 1
    pub fn resequence_categories(&self, ordered_ids: &[String]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        for (index, id) in ordered_ids.iter().enumerate() {
            tx.execute(
                "UPDATE course_category SET sort_order = ?1 WHERE id = ?2",
                params![(index + 1) as i32, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Role Assignment Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Assign a role; returns false if the assignment already exists
    pub fn assign_role(
        &self,
        role: &str,
        context_kind: &str,
        context_id: &str,
        member: &str,
        component: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO role_assignment
             (id, role, context_kind, context_id, member, component, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                uuid::Uuid::new_v4().to_string(),
                role,
                context_kind,
                context_id,
                member,
                component,
                now_millis(),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a role assignment made by `component`
    pub fn unassign_role(
        &self,
        role: &str,
        context_kind: &str,
        context_id: &str,
        member: &str,
        component: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let deleted = conn.execute(
            "DELETE FROM role_assignment
             WHERE role = ?1 AND context_kind = ?2 AND context_id = ?3 AND member = ?4 AND component = ?5",
            params![role, context_kind, context_id, member, component],
        )?;
        Ok(deleted > 0)
    }

    /// Check for a role assignment regardless of who made it
    pub fn has_role(&self, role: &str, context_kind: &str, context_id: &str, member: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM role_assignment
             WHERE role = ?1 AND context_kind = ?2 AND context_id = ?3 AND member = ?4",
            params![role, context_kind, context_id, member],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Course Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a course
    pub fn create_course(&self, course: &NewCourse) -> Result<String> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();
        conn.execute(
            "INSERT INTO course (id, shortname, fullname, category_id, idnumber, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id,
                course.shortname,
                course.fullname,
                course.category_id,
                course.idnumber,
                now,
            ],
        )?;
        Ok(id)
    }

    /// Get course by ID
    pub fn get_course(&self, course_id: &str) -> Result<Option<Course>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, shortname, fullname, category_id, idnumber FROM course WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![course_id], Self::map_course).optional()?)
    }

    /// Get course by short name
    pub fn get_course_by_shortname(&self, shortname: &str) -> Result<Option<Course>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, shortname, fullname, category_id, idnumber FROM course WHERE shortname = ?1",
        )?;
        Ok(stmt.query_row(params![shortname], Self::map_course).optional()?)
    }

    /// All courses, by short name
    pub fn list_courses(&self) -> Result<Vec<Course>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, shortname, fullname, category_id, idnumber FROM course ORDER BY shortname",
        )?;
        let courses = stmt
            .query_map([], Self::map_course)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    /// Courses directly inside a category
    pub fn list_courses_in_category(&self, category_id: &str) -> Result<Vec<Course>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, shortname, fullname, category_id, idnumber
             FROM course WHERE category_id = ?1 ORDER BY shortname",
        )?;
        let courses = stmt
            .query_map(params![category_id], Self::map_course)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    fn map_course(row: &rusqlite::Row) -> rusqlite::Result<Course> {
        Ok(Course {
            id: row.get(0)?,
            shortname: row.get(1)?,
            fullname: row.get(2)?,
            category_id: row.get(3)?,
            idnumber: row.get(4)?,
        })
    }

    /// Rewrite a course idnumber
    pub fn update_course_idnumber(&self, course_id: &str, idnumber: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "UPDATE course SET idnumber = ?1, updated_at = ?2 WHERE id = ?3",
            params![idnumber, now_millis(), course_id],
        )?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enrolment Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Enrolment instances of a course
    pub fn list_enrol_instances(&self, course_id: &str) -> Result<Vec<EnrolInstance>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, course_id, cohort_id, token, role, component, created_at
             FROM enrol_instance WHERE course_id = ?1 ORDER BY created_at, token",
        )?;
        let instances = stmt
            .query_map(params![course_id], |row| {
                Ok(EnrolInstance {
                    id: row.get(0)?,
                    course_id: row.get(1)?,
                    cohort_id: row.get(2)?,
                    token: row.get(3)?,
                    role: row.get(4)?,
                    component: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(instances)
    }

    /// Count enrolment instances bound to a cohort
    pub fn count_enrol_instances_for_cohort(&self, cohort_id: &str) -> Result<u32> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM enrol_instance WHERE cohort_id = ?1",
            params![cohort_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Create an enrolment instance
    pub fn create_enrol_instance(&self, instance: &NewEnrolInstance) -> Result<String> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO enrol_instance (id, course_id, cohort_id, token, role, component, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                instance.course_id,
                instance.cohort_id,
                instance.token,
                instance.role,
                instance.component,
                now_millis(),
            ],
        )?;
        Ok(id)
    }

    /// Delete an enrolment instance and its user enrolments
    pub fn delete_enrol_instance(&self, instance_id: &str) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM user_enrolment WHERE instance_id = ?1", params![instance_id])?;
        tx.execute("DELETE FROM enrol_instance WHERE id = ?1", params![instance_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Members enrolled through an instance
    pub fn list_user_enrolments(&self, instance_id: &str) -> Result<BTreeSet<String>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare("SELECT member FROM user_enrolment WHERE instance_id = ?1")?;
        let members = stmt
            .query_map(params![instance_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(members)
    }

    /// Enrol a member; returns false if already enrolled
    pub fn enrol_user(&self, instance_id: &str, member: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO user_enrolment (instance_id, member, created_at) VALUES (?1, ?2, ?3)",
            params![instance_id, member, now_millis()],
        )?;
        Ok(inserted > 0)
    }

    /// Unenrol a member; returns false if not enrolled
    pub fn unenrol_user(&self, instance_id: &str, member: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let deleted = conn.execute(
            "DELETE FROM user_enrolment WHERE instance_id = ?1 AND member = ?2",
            params![instance_id, member],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_cohort(idnumber: &str) -> NewCohort {
        NewCohort {
            idnumber: idnumber.to_string(),
            name: idnumber.to_string(),
            component: COMPONENT.to_string(),
        }
    }

    #[test]
    fn test_open_path_creates_schema() {
        let dir = tempdir().unwrap();
        let db = Database::open_path(&dir.path().join("test.db")).unwrap();
        db.ping().unwrap();
        assert!(db.list_courses().unwrap().is_empty());

        // reopening applies the schema again without error
        drop(db);
        let db = Database::open_path(&dir.path().join("test.db")).unwrap();
        db.ping().unwrap();
    }

    #[test]
    fn test_cohort_member_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_cohort(&new_cohort("5a")).unwrap();

        assert!(db.add_cohort_member(&id, "u1").unwrap());
        assert!(!db.add_cohort_member(&id, "u1").unwrap());
        assert!(db.add_cohort_member(&id, "u2").unwrap());
        assert_eq!(db.list_cohort_members(&id).unwrap().len(), 2);

        assert!(db.remove_cohort_member(&id, "u1").unwrap());
        assert!(!db.remove_cohort_member(&id, "u1").unwrap());

        db.delete_cohort(&id).unwrap();
        assert!(db.get_cohort_by_idnumber("5a").unwrap().is_none());
    }

    #[test]
    fn test_cohort_idnumber_ignores_case() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_cohort(&new_cohort("Teachers")).unwrap();

        assert_eq!(db.get_cohort_by_idnumber("teachers").unwrap().unwrap().id, id);
        assert!(db.create_cohort(&new_cohort("TEACHERS")).is_err());
    }

    #[test]
    fn test_category_order_and_move() {
        let db = Database::open_in_memory().unwrap();
        let root = db
            .create_category(&NewCategory {
                name: "Teachers".into(),
                ..Default::default()
            })
            .unwrap();
        let archive = db
            .create_category(&NewCategory {
                name: "Archive".into(),
                ..Default::default()
            })
            .unwrap();
        let b = db
            .create_category(&NewCategory {
                name: "b".into(),
                parent_id: Some(root.clone()),
                owner: Some("b".into()),
                ..Default::default()
            })
            .unwrap();
        let a = db
            .create_category(&NewCategory {
                name: "a".into(),
                parent_id: Some(root.clone()),
                owner: Some("a".into()),
                ..Default::default()
            })
            .unwrap();

        let names: Vec<_> = db.list_child_categories(&root).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["b", "a"]);

        db.resequence_categories(&[a.clone(), b.clone()]).unwrap();
        let names: Vec<_> = db.list_child_categories(&root).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        db.move_category(&b, &archive).unwrap();
        assert_eq!(db.list_child_categories(&root).unwrap().len(), 1);
        assert_eq!(db.list_categories_owned_by("b").unwrap()[0].parent_id.as_deref(), Some(archive.as_str()));
    }

    #[test]
    fn test_role_assignment_is_unique() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.assign_role("manager", CONTEXT_CATEGORY, "c1", "t1", COMPONENT).unwrap());
        assert!(!db.assign_role("manager", CONTEXT_CATEGORY, "c1", "t1", COMPONENT).unwrap());
        assert!(db.has_role("manager", CONTEXT_CATEGORY, "c1", "t1").unwrap());

        // another component's assignment is left alone
        assert!(!db.unassign_role("manager", CONTEXT_CATEGORY, "c1", "t1", "manual").unwrap());
        assert!(db.unassign_role("manager", CONTEXT_CATEGORY, "c1", "t1", COMPONENT).unwrap());
        assert!(!db.has_role("manager", CONTEXT_CATEGORY, "c1", "t1").unwrap());
    }

    #[test]
    fn test_enrol_instance_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let cohort = db.create_cohort(&new_cohort("5a")).unwrap();
        let course = db
            .create_course(&NewCourse {
                shortname: "math".into(),
                fullname: "Math".into(),
                ..Default::default()
            })
            .unwrap();
        let instance = db
            .create_enrol_instance(&NewEnrolInstance {
                course_id: course.clone(),
                cohort_id: cohort.clone(),
                token: "5a".into(),
                role: "student".into(),
                component: COMPONENT.into(),
            })
            .unwrap();

        assert_eq!(db.count_enrol_instances_for_cohort(&cohort).unwrap(), 1);
        assert!(db.enrol_user(&instance, "u1").unwrap());
        assert!(!db.enrol_user(&instance, "u1").unwrap());

        db.delete_enrol_instance(&instance).unwrap();
        assert!(db.list_enrol_instances(&course).unwrap().is_empty());
        assert!(db.list_user_enrolments(&instance).unwrap().is_empty());
        assert_eq!(db.count_enrol_instances_for_cohort(&cohort).unwrap(), 0);
    }
}
