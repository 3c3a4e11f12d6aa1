use anyhow::{Context, Result};
use indexmap::IndexMap;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::FilterValue;

/// Active filter settings of one session: field name -> submitted values.
/// A field never maps to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSessionStore {
    entries: IndexMap<String, Vec<FilterValue>>,
}

impl FilterSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, field: &str, value: FilterValue) {
        self.entries.entry(field.to_string()).or_default().push(value);
    }

    /// Remove the value at `index` of `field`. Returns false when there is none.
    pub fn remove_at(&mut self, field: &str, index: usize) -> bool {
        let Some(values) = self.entries.get_mut(field) else {
            return false;
        };
        if index >= values.len() {
            return false;
        }
        values.remove(index);
        if values.is_empty() {
            self.clear_field(field);
        }
        true
    }

    pub fn clear_field(&mut self, field: &str) {
        self.entries.shift_remove(field);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn active_entries(&self) -> &IndexMap<String, Vec<FilterValue>> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of stored values across all fields.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    fn prune_empty(&mut self) {
        self.entries.retain(|_, values| !values.is_empty());
    }
}

/// Read the stored state of `session_id`. `None` when there is no row or
/// the state cannot be decoded.
pub fn load_session(conn: &Connection, session_id: &str) -> Result<Option<FilterSessionStore>> {
    let state: Option<String> = conn
        .query_row(
            "SELECT state FROM filter_sessions WHERE session_id = ?1",
            [session_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(state) = state else {
        return Ok(None);
    };

    match serde_json::from_str::<FilterSessionStore>(&state) {
        Ok(mut store) => {
            store.prune_empty();
            Ok(Some(store))
        }
        Err(e) => {
            warn!("Discarding unreadable filter session {session_id}: {e}");
            Ok(None)
        }
    }
}

/// Load the store for `session_id`, starting empty when the session is new.
pub fn ensure_initialized(conn: &Connection, session_id: &str) -> Result<FilterSessionStore> {
    match load_session(conn, session_id)? {
        Some(store) => Ok(store),
        None => {
            debug!("New filter session: {session_id}");
            Ok(FilterSessionStore::new())
        }
    }
}

/// Persist the store. An empty store removes the session row.
pub fn save_session(conn: &Connection, session_id: &str, store: &FilterSessionStore) -> Result<()> {
    if store.is_empty() {
        delete_session(conn, session_id)?;
        return Ok(());
    }

    let state = serde_json::to_string(store).context("Failed to serialize filter session")?;
    conn.execute(
        "INSERT INTO filter_sessions (session_id, state, created_at, updated_at)
         VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'), strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
         ON CONFLICT(session_id) DO UPDATE SET state = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        rusqlite::params![session_id, state],
    )?;
    Ok(())
}

pub fn delete_session(conn: &Connection, session_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM filter_sessions WHERE session_id = ?1",
        [session_id],
    )?;
    Ok(deleted > 0)
}

/// Drop sessions not touched within `ttl_hours`. Returns how many were removed.
pub fn prune_expired_sessions(conn: &Connection, ttl_hours: i64) -> Result<usize> {
    if ttl_hours <= 0 {
        return Ok(0);
    }
    let modifier = format!("-{ttl_hours} hours");
    let pruned = conn.execute(
        "DELETE FROM filter_sessions
         WHERE updated_at < strftime('%Y-%m-%dT%H:%M:%SZ', 'now', ?1)",
        [modifier],
    )?;
    if pruned > 0 {
        debug!("Pruned {pruned} expired filter sessions");
    }
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::filters::select::SelectValue;

    fn select(value: i64) -> FilterValue {
        FilterValue::Select(SelectValue { value })
    }

    #[test]
    fn removing_last_value_drops_the_field() {
        let mut store = FilterSessionStore::new();
        store.append("course", select(1));
        store.append("course", select(2));
        assert!(store.remove_at("course", 0));
        assert_eq!(store.active_entries()["course"], vec![select(2)]);
        assert!(store.remove_at("course", 0));
        assert!(store.active_entries().get("course").is_none());
        assert!(!store.remove_at("course", 0));
        assert!(!store.remove_at("enddate", 3));
    }

    #[test]
    fn no_sequence_leaves_an_empty_list() {
        let mut store = FilterSessionStore::new();
        let ops: &[(&str, Option<usize>)] = &[
            ("course", None),
            ("startdate", None),
            ("course", Some(0)),
            ("course", None),
            ("startdate", Some(0)),
            ("startdate", Some(5)),
            ("course", None),
            ("course", Some(1)),
            ("course", Some(0)),
        ];
        for (i, (field, remove)) in ops.iter().enumerate() {
            match remove {
                Some(index) => {
                    store.remove_at(field, *index);
                }
                None => store.append(field, select(i as i64)),
            }
            assert!(store.active_entries().values().all(|v| !v.is_empty()));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn session_round_trips_through_the_database() {
        let db = Database::open_in_memory().unwrap();
        assert!(ensure_initialized(&db.conn, "alice").unwrap().is_empty());

        let mut store = FilterSessionStore::new();
        store.append("course", select(5));
        save_session(&db.conn, "alice", &store).unwrap();

        assert_eq!(ensure_initialized(&db.conn, "alice").unwrap(), store);
        assert!(ensure_initialized(&db.conn, "bob").unwrap().is_empty());

        store.clear_all();
        save_session(&db.conn, "alice", &store).unwrap();
        let rows: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM filter_sessions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn unreadable_state_starts_fresh() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO filter_sessions (session_id, state) VALUES ('x', 'not json')",
                [],
            )
            .unwrap();
        assert!(load_session(&db.conn, "x").unwrap().is_none());
        assert!(ensure_initialized(&db.conn, "x").unwrap().is_empty());
    }

    #[test]
    fn expired_sessions_are_pruned() {
        let db = Database::open_in_memory().unwrap();
        let mut store = FilterSessionStore::new();
        store.append("course", select(1));
        save_session(&db.conn, "fresh", &store).unwrap();
        save_session(&db.conn, "stale", &store).unwrap();
        db.conn
            .execute(
                "UPDATE filter_sessions SET updated_at = '2000-01-01T00:00:00Z' WHERE session_id = 'stale'",
                [],
            )
            .unwrap();

        assert_eq!(prune_expired_sessions(&db.conn, 24).unwrap(), 1);
        assert!(!ensure_initialized(&db.conn, "fresh").unwrap().is_empty());
        assert!(ensure_initialized(&db.conn, "stale").unwrap().is_empty());
        assert_eq!(prune_expired_sessions(&db.conn, 0).unwrap(), 0);
    }
}
