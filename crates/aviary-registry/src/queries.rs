use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::models::Channel;
use crate::{Registry, Result};

impl Registry {
    /// Upsert a channel row. Re-inserting the same channel_id overwrites the
    /// timestamps, which is what we want under at-least-once connect events.
    pub fn insert(
        &self,
        channel_id: &str,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ts = now.to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO channels (channel_id, subscriber_id, opened_at, last_seen)
                 VALUES (?1, ?2, ?3, ?4)",
                (channel_id, subscriber_id, &ts, &ts),
            )?;
            Ok(())
        })
    }

    /// Delete a channel row. Removing an absent id is a no-op: close events,
    /// gone-reclamation, and the stale sweep may all race on the same row.
    /// Returns whether a row was actually deleted.
    pub fn remove(&self, channel_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM channels WHERE channel_id = ?1", [channel_id])?;
            Ok(n > 0)
        })
    }

    /// All channels currently registered to a subscriber. May be empty.
    pub fn list_by_subscriber(&self, subscriber_id: &str) -> Result<Vec<Channel>> {
        self.with_conn(|conn| query_by_subscriber(conn, subscriber_id))
    }

    /// Opportunistic last_seen refresh. Absent ids are ignored;
    /// last-writer-wins is fine here.
    pub fn touch(&self, channel_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE channels SET last_seen = ?1 WHERE channel_id = ?2",
                (&now.to_rfc3339(), channel_id),
            )?;
            Ok(())
        })
    }

    /// Drop rows whose last_seen predates the cutoff. Backstop for channels
    /// that died without a close event. Returns the number of rows pruned.
    pub fn remove_stale(&self, older_than: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM channels WHERE last_seen < ?1",
                [&older_than.to_rfc3339()],
            )?;
            Ok(n)
        })
    }
}

fn query_by_subscriber(conn: &Connection, subscriber_id: &str) -> Result<Vec<Channel>> {
    let mut stmt = conn.prepare(
        "SELECT channel_id, subscriber_id, opened_at, last_seen
         FROM channels
         WHERE subscriber_id = ?1",
    )?;

    let rows = stmt
        .query_map([subscriber_id], |row| {
            Ok(Channel {
                channel_id: row.get(0)?,
                subscriber_id: row.get(1)?,
                opened_at: row.get(2)?,
                last_seen: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn registry() -> Registry {
        Registry::open_in_memory().unwrap()
    }

    #[test]
    fn insert_then_list() {
        let reg = registry();
        let now = Utc::now();
        reg.insert("c1", "u1", now).unwrap();
        reg.insert("c2", "u1", now).unwrap();
        reg.insert("c3", "u2", now).unwrap();

        let mut ids: Vec<String> = reg
            .list_by_subscriber("u1")
            .unwrap()
            .into_iter()
            .map(|c| c.channel_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert!(reg.list_by_subscriber("nobody").unwrap().is_empty());
    }

    #[test]
    fn remove_excludes_channel_and_is_idempotent() {
        let reg = registry();
        reg.insert("c1", "u1", Utc::now()).unwrap();

        assert!(reg.remove("c1").unwrap());
        assert!(reg.list_by_subscriber("u1").unwrap().is_empty());

        // Second delete of the same id is a no-op, not an error
        assert!(!reg.remove("c1").unwrap());
        assert!(!reg.remove("never-existed").unwrap());
    }

    #[test]
    fn reinsert_overwrites_timestamps() {
        let reg = registry();
        let t0 = Utc::now() - Duration::hours(1);
        let t1 = Utc::now();
        reg.insert("c1", "u1", t0).unwrap();
        reg.insert("c1", "u1", t1).unwrap();

        let rows = reg.list_by_subscriber("u1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].opened_at, t1.to_rfc3339());
    }

    #[test]
    fn touch_refreshes_last_seen() {
        let reg = registry();
        let t0 = Utc::now() - Duration::hours(1);
        let t1 = Utc::now();
        reg.insert("c1", "u1", t0).unwrap();
        reg.touch("c1", t1).unwrap();

        let rows = reg.list_by_subscriber("u1").unwrap();
        assert_eq!(rows[0].last_seen, t1.to_rfc3339());
        assert_eq!(rows[0].opened_at, t0.to_rfc3339());

        // Touching an absent id is silently ignored
        reg.touch("ghost", t1).unwrap();
    }

    #[test]
    fn remove_stale_prunes_only_old_rows() {
        let reg = registry();
        let old = Utc::now() - Duration::hours(2);
        let fresh = Utc::now();
        reg.insert("c-old", "u1", old).unwrap();
        reg.insert("c-fresh", "u1", fresh).unwrap();

        let pruned = reg.remove_stale(Utc::now() - Duration::hours(1)).unwrap();
        assert_eq!(pruned, 1);

        let rows = reg.list_by_subscriber("u1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].channel_id, "c-fresh");
    }
}
