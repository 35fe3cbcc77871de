// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use crate::event::{LogEvent, Severity};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid stored timestamp for event {event_id}: {source}")]
    InvalidTimestamp {
        event_id: String,
        source: chrono::ParseError,
    },
}

/// Single-table relational store for normalized log events.
///
/// `event_id` carries a UNIQUE constraint; inserts use conflict-ignore
/// semantics so replayed events are deduplicated.
pub struct EventStore {
    db: Connection,
}

impl EventStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY,
            event_id TEXT NOT NULL UNIQUE,
            level TEXT NOT NULL,
            message TEXT NOT NULL,
            client_name TEXT NOT NULL,
            category TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_logs_timestamp
        ON logs(timestamp);

        CREATE INDEX IF NOT EXISTS idx_logs_level
        ON logs(level);
    ";

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Connection::open(path)?;
        Self::initialize(db)
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch(Self::SCHEMA)?;
        Ok(EventStore { db })
    }

    /// Inserts an event, ignoring conflicts on `event_id`. Returns whether a
    /// row was actually written.
    pub fn insert(&self, event: &LogEvent) -> Result<bool, StoreError> {
        let rows = self.db.execute(
            "INSERT OR IGNORE INTO logs (event_id, level, message, client_name, category, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.event_id,
                event.level.as_str(),
                event.message,
                event.client_name,
                event.category,
                // Fixed-width UTC form so lexicographic ordering matches
                // chronological ordering.
                event.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(rows > 0)
    }

    /// Most recent events, timestamp-descending.
    pub fn recent(&self, limit: usize) -> Result<Vec<LogEvent>, StoreError> {
        let mut stmt = self.db.prepare(
            "SELECT event_id, level, message, client_name, category, timestamp
             FROM logs ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (event_id, level, message, client_name, category, timestamp) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|source| StoreError::InvalidTimestamp {
                    event_id: event_id.clone(),
                    source,
                })?;
            events.push(LogEvent {
                event_id,
                level: Severity::parse(Some(&level)),
                message,
                client_name,
                category,
                timestamp,
            });
        }
        Ok(events)
    }

    /// Event counts grouped by severity level.
    pub fn counts_by_level(&self) -> Result<Vec<(String, u64)>, StoreError> {
        let mut stmt = self
            .db
            .prepare("SELECT level, COUNT(*) FROM logs GROUP BY level ORDER BY level")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_event(event_id: &str, level: Severity, hour: u32) -> LogEvent {
        LogEvent {
            event_id: event_id.to_string(),
            level,
            message: format!("message for {event_id}"),
            client_name: "test-client".to_string(),
            category: "system".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_insert_returns_true_for_new_event() {
        let store = EventStore::open_in_memory().unwrap();
        assert!(store.insert(&test_event("e1", Severity::Info, 1)).unwrap());
    }

    #[test]
    fn test_insert_is_idempotent_on_event_id() {
        let store = EventStore::open_in_memory().unwrap();
        assert!(store.insert(&test_event("e1", Severity::Info, 1)).unwrap());
        // same id, different content: ignored
        assert!(!store.insert(&test_event("e1", Severity::Error, 2)).unwrap());

        let events = store.recent(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Severity::Info);
    }

    #[test]
    fn test_recent_orders_by_timestamp_descending() {
        let store = EventStore::open_in_memory().unwrap();
        store.insert(&test_event("old", Severity::Info, 1)).unwrap();
        store.insert(&test_event("new", Severity::Info, 9)).unwrap();
        store.insert(&test_event("mid", Severity::Info, 5)).unwrap();

        let ids: Vec<String> = store
            .recent(10)
            .unwrap()
            .into_iter()
            .map(|e| e.event_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_recent_honors_limit() {
        let store = EventStore::open_in_memory().unwrap();
        for hour in 1..6 {
            store
                .insert(&test_event(&format!("e{hour}"), Severity::Info, hour))
                .unwrap();
        }
        assert_eq!(store.recent(2).unwrap().len(), 2);
    }

    #[test]
    fn test_recent_round_trips_fields() {
        let store = EventStore::open_in_memory().unwrap();
        let event = test_event("e1", Severity::Warning, 3);
        store.insert(&event).unwrap();

        let restored = store.recent(1).unwrap().remove(0);
        assert_eq!(restored.event_id, event.event_id);
        assert_eq!(restored.level, event.level);
        assert_eq!(restored.message, event.message);
        assert_eq!(restored.client_name, event.client_name);
        assert_eq!(restored.category, event.category);
        assert_eq!(restored.timestamp, event.timestamp);
    }

    #[test]
    fn test_category_column_is_not_rewritten() {
        let store = EventStore::open_in_memory().unwrap();
        let mut event = test_event("e1", Severity::Info, 1);
        event.category = "database".to_string();
        store.insert(&event).unwrap();

        let restored = store.recent(1).unwrap().remove(0);
        assert_eq!(restored.category, "database");
    }

    #[test]
    fn test_counts_by_level() {
        let store = EventStore::open_in_memory().unwrap();
        store.insert(&test_event("e1", Severity::Error, 1)).unwrap();
        store.insert(&test_event("e2", Severity::Error, 2)).unwrap();
        store.insert(&test_event("e3", Severity::Debug, 3)).unwrap();

        let counts = store.counts_by_level().unwrap();
        assert_eq!(
            counts,
            vec![("DEBUG".to_string(), 1), ("ERROR".to_string(), 2)]
        );
    }

    #[test]
    fn test_open_creates_db_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.db");
        {
            let store = EventStore::open(&path).unwrap();
            store.insert(&test_event("e1", Severity::Info, 1)).unwrap();
        }
        let store = EventStore::open(&path).unwrap();
        assert_eq!(store.recent(10).unwrap().len(), 1);
    }
}
