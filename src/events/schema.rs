use rusqlite::{Connection, Result};

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            namespace TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            event_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
        ",
    )?;

    Ok(())
}
