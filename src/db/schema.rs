use anyhow::Result;
use rusqlite::Connection;

pub const SCHEMA_VERSION: &str = "1";

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Version tracking
        CREATE TABLE IF NOT EXISTS report_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Entity store
        CREATE TABLE IF NOT EXISTS course_categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            parent INTEGER NOT NULL DEFAULT 0,
            path TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            fullname TEXT NOT NULL,
            shortname TEXT NOT NULL DEFAULT '',
            category INTEGER NOT NULL DEFAULT 0,
            visible INTEGER NOT NULL DEFAULT 1,
            enablecompletion INTEGER NOT NULL DEFAULT 1,
            startdate INTEGER NOT NULL DEFAULT 0,
            enddate INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            firstname TEXT NOT NULL DEFAULT '',
            lastname TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS role_assignments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role_id INTEGER NOT NULL,
            UNIQUE(course_id, user_id, role_id)
        );

        CREATE TABLE IF NOT EXISTS course_completions (
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            timecompleted INTEGER,
            PRIMARY KEY (course_id, user_id)
        );

        -- Per-session filter state
        CREATE TABLE IF NOT EXISTS filter_sessions (
            session_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Indexes for the report queries
        CREATE INDEX IF NOT EXISTS idx_courses_fullname ON courses(fullname);
        CREATE INDEX IF NOT EXISTS idx_courses_completion ON courses(enablecompletion);
        CREATE INDEX IF NOT EXISTS idx_role_assignments_course ON role_assignments(course_id, role_id);
        CREATE INDEX IF NOT EXISTS idx_filter_sessions_updated ON filter_sessions(updated_at);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO report_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
