use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

/// Per-item progress through the pipeline. Ordered: a later run may only
/// move an item forward, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Downloaded,
    Split,
    Organized,
}

impl ItemStatus {
    pub fn rank(self) -> u8 {
        match self {
            ItemStatus::Downloaded => 1,
            ItemStatus::Split => 2,
            ItemStatus::Organized => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Downloaded => "downloaded",
            ItemStatus::Split => "split",
            ItemStatus::Organized => "organized",
        }
    }

    /// Unknown strings map to `None`; corrupt rows are treated as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "downloaded" => Some(ItemStatus::Downloaded),
            "split" => Some(ItemStatus::Split),
            "organized" => Some(ItemStatus::Organized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub video_id: String,
    pub status: ItemStatus,
    pub audio_file: Option<String>,
    pub split_dir: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CachedDownload {
    pub video_id: String,
    pub audio_file: String,
    pub recorded_at: String,
}

#[derive(Debug, Clone)]
pub struct CachedSplit {
    pub fingerprint: String,
    pub split_dir: String,
    pub recorded_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS download_cache (
                video_id TEXT PRIMARY KEY,
                audio_file TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS split_cache (
                fingerprint TEXT PRIMARY KEY,
                split_dir TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS batch_items (
                playlist_id TEXT NOT NULL,
                video_id TEXT NOT NULL,
                status TEXT NOT NULL,
                audio_file TEXT,
                split_dir TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (playlist_id, video_id)
            );
            CREATE INDEX IF NOT EXISTS idx_batch_items_updated
                ON batch_items(updated_at DESC);
            "#,
        )?;
        Ok(())
    }

    // ── download cache ────────────────────────────────────────────────────

    pub fn download_get(&self, video_id: &str) -> Result<Option<String>> {
        let path = self
            .conn
            .query_row(
                "SELECT audio_file FROM download_cache WHERE video_id = ?1",
                params![video_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(path.filter(|p| !p.is_empty()))
    }

    pub fn download_set(&self, video_id: &str, audio_file: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO download_cache (video_id, audio_file, recorded_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(video_id) DO UPDATE SET
                audio_file = excluded.audio_file,
                recorded_at = excluded.recorded_at
            "#,
            params![video_id, audio_file, now],
        )?;
        Ok(())
    }

    /// All cached video IDs, used to seed the downloader's archive file.
    pub fn download_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT video_id FROM download_cache ORDER BY recorded_at")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_downloads(&self) -> Result<Vec<CachedDownload>> {
        let mut stmt = self.conn.prepare(
            "SELECT video_id, audio_file, recorded_at FROM download_cache ORDER BY recorded_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CachedDownload {
                video_id: row.get(0)?,
                audio_file: row.get(1)?,
                recorded_at: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ── split cache ───────────────────────────────────────────────────────

    pub fn split_get(&self, fingerprint: &str) -> Result<Option<String>> {
        let dir = self
            .conn
            .query_row(
                "SELECT split_dir FROM split_cache WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(dir.filter(|d| !d.is_empty()))
    }

    pub fn split_set(&self, fingerprint: &str, split_dir: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO split_cache (fingerprint, split_dir, recorded_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(fingerprint) DO UPDATE SET
                split_dir = excluded.split_dir,
                recorded_at = excluded.recorded_at
            "#,
            params![fingerprint, split_dir, now],
        )?;
        Ok(())
    }

    pub fn list_splits(&self) -> Result<Vec<CachedSplit>> {
        let mut stmt = self.conn.prepare(
            "SELECT fingerprint, split_dir, recorded_at FROM split_cache ORDER BY recorded_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CachedSplit {
                fingerprint: row.get(0)?,
                split_dir: row.get(1)?,
                recorded_at: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ── batch state ───────────────────────────────────────────────────────

    pub fn batch_item(&self, playlist_id: &str, video_id: &str) -> Result<Option<ItemRecord>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT status, audio_file, split_dir, updated_at
                FROM batch_items WHERE playlist_id = ?1 AND video_id = ?2
                "#,
                params![playlist_id, video_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.and_then(|(status, audio_file, split_dir, updated_at)| {
            // A row with an unrecognized status is stale garbage; pretend
            // the item was never tracked rather than failing the batch.
            let status = ItemStatus::parse(&status)?;
            Some(ItemRecord {
                video_id: video_id.to_string(),
                status,
                audio_file: audio_file.filter(|p| !p.is_empty()),
                split_dir: split_dir.filter(|p| !p.is_empty()),
                updated_at,
            })
        }))
    }

    /// Record a phase transition, written durably before the next phase runs.
    ///
    /// Status is monotonic: an attempt to write a lower-ranked status than
    /// the stored one keeps the stored status and only refreshes artifact
    /// paths. Equal rank is allowed so re-derived paths can be re-recorded.
    pub fn advance_item(
        &self,
        playlist_id: &str,
        video_id: &str,
        status: ItemStatus,
        audio_file: Option<&str>,
        split_dir: Option<&str>,
    ) -> Result<()> {
        let stored = self.batch_item(playlist_id, video_id)?;
        let status = match &stored {
            Some(rec) if rec.status.rank() > status.rank() => rec.status,
            _ => status,
        };
        let audio_file = audio_file
            .map(str::to_string)
            .or_else(|| stored.as_ref().and_then(|r| r.audio_file.clone()));
        let split_dir = split_dir
            .map(str::to_string)
            .or_else(|| stored.as_ref().and_then(|r| r.split_dir.clone()));
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO batch_items (playlist_id, video_id, status, audio_file, split_dir, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(playlist_id, video_id) DO UPDATE SET
                status = excluded.status,
                audio_file = excluded.audio_file,
                split_dir = excluded.split_dir,
                updated_at = excluded.updated_at
            "#,
            params![
                playlist_id,
                video_id,
                status.as_str(),
                audio_file,
                split_dir,
                now
            ],
        )?;
        Ok(())
    }

    pub fn list_batch_items(&self) -> Result<Vec<(String, ItemRecord)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT playlist_id, video_id, status, audio_file, split_dir, updated_at
            FROM batch_items ORDER BY updated_at DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (playlist_id, video_id, status, audio_file, split_dir, updated_at) = row?;
            let Some(status) = ItemStatus::parse(&status) else {
                continue;
            };
            out.push((
                playlist_id,
                ItemRecord {
                    video_id,
                    status,
                    audio_file: audio_file.filter(|p| !p.is_empty()),
                    split_dir: split_dir.filter(|p| !p.is_empty()),
                    updated_at,
                },
            ));
        }
        Ok(out)
    }

    // ── maintenance ───────────────────────────────────────────────────────

    /// Remove cache records older than `days`. Batch items are kept; they
    /// are only removed by an explicit `forget`.
    pub fn clean_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let mut removed = self.conn.execute(
            "DELETE FROM download_cache WHERE recorded_at < ?1",
            params![cutoff],
        )?;
        removed += self.conn.execute(
            "DELETE FROM split_cache WHERE recorded_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }

    pub fn forget_video(&self, video_id: &str) -> Result<usize> {
        let mut removed = self.conn.execute(
            "DELETE FROM download_cache WHERE video_id = ?1",
            params![video_id],
        )?;
        removed += self.conn.execute(
            "DELETE FROM batch_items WHERE video_id = ?1",
            params![video_id],
        )?;
        Ok(removed)
    }
}
