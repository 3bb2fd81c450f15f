//! Local key-value store holding one serialized snapshot per namespace.

use crate::events::schema;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db parent dir {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn save<T: Serialize>(&self, namespace: &str, value: &T, event_count: usize) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("serialize snapshot `{namespace}`"))?;
        self.conn.execute(
            "INSERT INTO kv (namespace, value_json, event_count, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace) DO UPDATE SET
                value_json = excluded.value_json,
                event_count = excluded.event_count,
                updated_at = excluded.updated_at",
            params![namespace, raw, event_count as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self, namespace: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM kv WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| {
            serde_json::from_str(&raw).with_context(|| format!("parse snapshot `{namespace}`"))
        })
        .transpose()
    }

    pub fn delete(&self, namespace: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE namespace = ?1", params![namespace])?;
        Ok(())
    }
}
