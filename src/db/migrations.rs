use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Run all pending migrations. The v1 schema is created by schema.rs; later
/// changes are appended here as numbered migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS report_migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );",
    )?;

    run_migration(conn, 1, "index_completions_by_user", |c| {
        c.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_course_completions_user ON course_completions(user_id);",
        )?;
        Ok(())
    })?;

    Ok(())
}

fn run_migration<F>(conn: &Connection, id: i64, name: &str, f: F) -> Result<()>
where
    F: FnOnce(&Connection) -> Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM report_migrations WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;

    if already_applied {
        return Ok(());
    }

    f(conn)?;

    conn.execute(
        "INSERT INTO report_migrations (id, name) VALUES (?1, ?2)",
        rusqlite::params![id, name],
    )?;

    info!("Applied migration {id}: {name}");
    Ok(())
}
