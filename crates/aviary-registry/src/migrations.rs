use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Registry: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE channels (
                channel_id TEXT PRIMARY KEY,
                subscriber_id TEXT NOT NULL,
                opened_at TEXT NOT NULL,
                last_seen TEXT NOT NULL
            );

            CREATE INDEX idx_channels_subscriber ON channels (subscriber_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
