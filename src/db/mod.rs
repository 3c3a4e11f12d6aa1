pub mod migrations;
pub mod models;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::filters::SqlFilter;
use models::*;

pub struct Database {
    pub conn: Connection,
    pub path: PathBuf,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        let db = Self::init(conn, path.to_path_buf())?;
        info!("Opened database: {}", path.display());
        Ok(db)
    }

    /// Open a throwaway in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        schema::create_schema(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Database { conn, path })
    }

    /// Default database path: ~/.approval-report/report.db
    pub fn default_db_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".approval-report").join("report.db"))
    }

    /// Load a dataset in one transaction. Existing rows with the same ids are replaced.
    pub fn import_dataset(&self, data: &NewDataset) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for c in &data.categories {
            tx.execute(
                "INSERT OR REPLACE INTO course_categories (id, name, parent, path)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![c.id, c.name, c.parent, c.path],
            )?;
        }

        for c in &data.courses {
            tx.execute(
                "INSERT INTO courses (id, fullname, shortname, category, visible, enablecompletion, startdate, enddate)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    fullname = excluded.fullname,
                    shortname = excluded.shortname,
                    category = excluded.category,
                    visible = excluded.visible,
                    enablecompletion = excluded.enablecompletion,
                    startdate = excluded.startdate,
                    enddate = excluded.enddate",
                rusqlite::params![
                    c.id,
                    c.fullname,
                    c.shortname,
                    c.category,
                    c.visible,
                    c.enablecompletion,
                    c.startdate,
                    c.enddate,
                ],
            )?;
        }

        for u in &data.users {
            tx.execute(
                "INSERT INTO users (id, username, firstname, lastname)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    username = excluded.username,
                    firstname = excluded.firstname,
                    lastname = excluded.lastname",
                rusqlite::params![u.id, u.username, u.firstname, u.lastname],
            )?;
        }

        for e in &data.enrolments {
            tx.execute(
                "INSERT OR IGNORE INTO role_assignments (course_id, user_id, role_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![e.course_id, e.user_id, e.role_id],
            )?;
            if let Some(ts) = e.time_completed {
                tx.execute(
                    "INSERT OR REPLACE INTO course_completions (course_id, user_id, timecompleted)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![e.course_id, e.user_id, ts],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// List courses matching `filter`, ordered by `order_by`. A `limit` of 0 means no limit.
    pub fn list_courses(
        &self,
        filter: &SqlFilter,
        order_by: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Course>> {
        let limit = if limit > 0 { limit } else { -1 };
        let sql = format!(
            "SELECT id, fullname, shortname, category, visible, enablecompletion, startdate, enddate
             FROM courses
             {}
             ORDER BY {order_by}
             LIMIT {limit} OFFSET {}",
            where_clause(filter),
            offset.max(0)
        );
        debug!("list_courses: {sql}");

        let names = param_names(filter);
        let named = named_params(&names, filter);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(named.as_slice(), |row| {
            Ok(Course {
                id: row.get(0)?,
                fullname: row.get(1)?,
                shortname: row.get(2)?,
                category: row.get(3)?,
                visible: row.get(4)?,
                enablecompletion: row.get(5)?,
                startdate: row.get(6)?,
                enddate: row.get(7)?,
            })
        })?;

        let mut courses = Vec::new();
        for row in rows {
            courses.push(row?);
        }
        Ok(courses)
    }

    /// Count courses matching `filter`.
    pub fn count_courses(&self, filter: &SqlFilter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM courses {}", where_clause(filter));
        let names = param_names(filter);
        let named = named_params(&names, filter);
        let count = self.conn.query_row(&sql, named.as_slice(), |r| r.get(0))?;
        Ok(count)
    }

    /// Count courses with completion tracking enabled, ignoring any filter.
    pub fn count_completion_courses(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM courses WHERE enablecompletion = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// All courses as (id, fullname) ordered by name, for the course selector.
    pub fn course_options(&self) -> Result<Vec<(i64, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fullname FROM courses ORDER BY fullname, id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut options = Vec::new();
        for row in rows {
            options.push(row?);
        }
        Ok(options)
    }

    /// All categories keyed by id.
    pub fn get_categories(&self) -> Result<HashMap<i64, Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, parent, path FROM course_categories")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                parent: row.get(2)?,
                path: row.get(3)?,
            })
        })?;
        let mut categories = HashMap::new();
        for row in rows {
            let c = row?;
            categories.insert(c.id, c);
        }
        Ok(categories)
    }

    /// Role assignments of a course restricted to `roles`, with completion time when present.
    pub fn get_associations(&self, course_id: i64, roles: &[i64]) -> Result<Vec<Association>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (0..roles.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT ra.id, ra.role_id, cc.timecompleted, ra.user_id
             FROM role_assignments ra
             LEFT JOIN course_completions cc ON cc.course_id = ra.course_id AND cc.user_id = ra.user_id
             WHERE ra.course_id = ?1 AND ra.role_id IN ({})
             ORDER BY ra.id",
            placeholders.join(", ")
        );

        let mut all_params: Vec<&dyn ToSql> = vec![&course_id as &dyn ToSql];
        for r in roles {
            all_params.push(r);
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(all_params.as_slice(), |row| {
            let completed: Option<i64> = row.get(2)?;
            Ok(Association {
                assignment_id: row.get(0)?,
                role_id: row.get(1)?,
                time_completed: completed.filter(|ts| *ts > 0),
                user_id: row.get(3)?,
            })
        })?;

        let mut associations = Vec::new();
        for row in rows {
            associations.push(row?);
        }
        Ok(associations)
    }

    /// Get a single participant by id.
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, firstname, lastname FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        firstname: row.get(2)?,
                        lastname: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<DbStats> {
        let count = |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |r| r.get(0))?) };

        let db_size_bytes = std::fs::metadata(&self.path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(DbStats {
            courses: count("SELECT COUNT(*) FROM courses")?,
            completion_courses: self.count_completion_courses()?,
            categories: count("SELECT COUNT(*) FROM course_categories")?,
            users: count("SELECT COUNT(*) FROM users")?,
            role_assignments: count("SELECT COUNT(*) FROM role_assignments")?,
            completions: count(
                "SELECT COUNT(*) FROM course_completions WHERE timecompleted IS NOT NULL AND timecompleted > 0",
            )?,
            sessions: count("SELECT COUNT(*) FROM filter_sessions")?,
            db_size_bytes,
        })
    }

    pub fn schema_version(&self) -> Result<Option<String>> {
        let version = self
            .conn
            .query_row(
                "SELECT value FROM report_meta WHERE key = 'schema_version'",
                [],
                |r| r.get(0),
            )
            .optional()?;
        Ok(version)
    }
}

fn where_clause(filter: &SqlFilter) -> String {
    if filter.condition.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", filter.condition)
    }
}

fn param_names(filter: &SqlFilter) -> Vec<String> {
    filter.params.keys().map(|k| format!(":{k}")).collect()
}

fn named_params<'a>(names: &'a [String], filter: &'a SqlFilter) -> Vec<(&'a str, &'a dyn ToSql)> {
    names
        .iter()
        .zip(filter.params.values())
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rusqlite::types::Value;
    use std::collections::BTreeMap;

    /// Ten courses, ids 1..=10; course 5 has four enrolments, course 6 none.
    pub(crate) fn sample_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let mut data = NewDataset {
            categories: vec![
                NewCategory { id: 1, name: "Science".into(), parent: 0, path: "/1".into() },
                NewCategory { id: 2, name: "Physics".into(), parent: 1, path: "/1/2".into() },
            ],
            ..Default::default()
        };
        for id in 1..=10 {
            data.courses.push(NewCourse {
                id,
                fullname: format!("Course {id:02}"),
                shortname: format!("C{id}"),
                category: if id % 2 == 0 { 2 } else { 0 },
                visible: id != 3,
                enablecompletion: id != 10,
                startdate: 1_700_000_000 + id * 86_400,
                enddate: 1_710_000_000 + id * 86_400,
            });
        }
        for id in 1..=4 {
            data.users.push(NewUser {
                id,
                username: format!("student{id}"),
                firstname: format!("First{id}"),
                lastname: format!("Last{id}"),
            });
            data.enrolments.push(NewEnrolment {
                course_id: 5,
                user_id: id,
                role_id: 5,
                time_completed: if id <= 3 { Some(1_720_000_000 + id) } else { None },
            });
        }
        // Teacher role, not a gradebook role.
        data.enrolments.push(NewEnrolment { course_id: 5, user_id: 4, role_id: 3, time_completed: None });
        db.import_dataset(&data).unwrap();
        db
    }

    #[test]
    fn list_and_count_apply_named_params() {
        let db = sample_db();
        let mut params = BTreeMap::new();
        params.insert("ex_startdate_0".to_string(), Value::Integer(1_700_000_000 + 5 * 86_400));
        let filter = SqlFilter {
            condition: "enablecompletion = 1 AND startdate > :ex_startdate_0".into(),
            params,
        };

        let courses = db.list_courses(&filter, "fullname ASC", 0, 0).unwrap();
        let ids: Vec<i64> = courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![6, 7, 8, 9]);
        assert_eq!(db.count_courses(&filter).unwrap(), 4);
        assert_eq!(db.count_completion_courses().unwrap(), 9);
    }

    #[test]
    fn list_courses_pages_with_offset_and_limit() {
        let db = sample_db();
        let page = db
            .list_courses(&SqlFilter::default(), "fullname DESC", 2, 3)
            .unwrap();
        let names: Vec<&str> = page.iter().map(|c| c.fullname.as_str()).collect();
        assert_eq!(names, vec!["Course 08", "Course 07", "Course 06"]);
    }

    #[test]
    fn associations_only_include_requested_roles() {
        let db = sample_db();
        let assoc = db.get_associations(5, &[5]).unwrap();
        assert_eq!(assoc.len(), 4);
        assert_eq!(assoc.iter().filter(|a| a.time_completed.is_some()).count(), 3);

        let with_teachers = db.get_associations(5, &[3, 5]).unwrap();
        assert_eq!(with_teachers.len(), 5);
        assert!(db.get_associations(5, &[]).unwrap().is_empty());
        assert!(db.get_associations(6, &[5]).unwrap().is_empty());
    }

    #[test]
    fn get_user_and_stats() {
        let db = sample_db();
        let user = db.get_user(2).unwrap().unwrap();
        assert_eq!(user.fullname(), "First2 Last2");
        assert!(db.get_user(99).unwrap().is_none());

        let stats = db.stats().unwrap();
        assert_eq!(stats.courses, 10);
        assert_eq!(stats.completion_courses, 9);
        assert_eq!(stats.role_assignments, 5);
        assert_eq!(stats.completions, 3);
        assert_eq!(db.schema_version().unwrap().as_deref(), Some(schema::SCHEMA_VERSION));
    }
}
