//! juicebot persistence: SQLite nickname history.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

/// A nickname change to record. An empty nickname means the member cleared it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameChange {
    pub guild_id: String,
    pub user_id: String,
    pub new_display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameHistoryEntry {
    pub id: i64,
    pub guild_id: String,
    pub user_id: String,
    pub new_display_name: String,
    /// Seconds since epoch.
    pub changed_at: i64,
}

pub trait NameStore: Send + Sync {
    fn add_name(&self, change: &NameChange, ts: i64) -> Result<()>;
    /// Newest first.
    fn history(&self, guild_id: &str, user_id: &str) -> Result<Vec<NameHistoryEntry>>;
}

/// SQLite-backed store. Simple, synchronous; a nickname change is a single-row insert.
pub struct SqliteStore {
    db: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    pub fn open_default() -> Result<Self> {
        let path = std::env::var("JUICEBOT_DB_PATH").unwrap_or_else(|_| default_db_path());
        Self::open(&path)
    }

    pub fn open(path: &str) -> Result<Self> {
        let started = std::time::Instant::now();
        let db = rusqlite::Connection::open(path).with_context(|| format!("opening sqlite db at {}", path))?;
        db.pragma_update(None, "journal_mode", "WAL").ok();
        db.pragma_update(None, "synchronous", "NORMAL").ok();
        db.execute(
            "CREATE TABLE IF NOT EXISTS names (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id         TEXT NOT NULL,
                user_id          TEXT NOT NULL,
                new_display_name TEXT NOT NULL,
                changed_at       INTEGER NOT NULL
            )",
            [],
        )
        .context("creating names table")?;
        db.execute("CREATE INDEX IF NOT EXISTS idx_names_guild_user ON names(guild_id, user_id, changed_at DESC)", [])
            .ok();
        let me = Self { db: std::sync::Mutex::new(db) };
        histogram!("persist_open_ms", started.elapsed().as_secs_f64() * 1000.0);
        Ok(me)
    }
}

impl NameStore for SqliteStore {
    fn add_name(&self, change: &NameChange, ts: i64) -> Result<()> {
        let started = std::time::Instant::now();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO names(guild_id, user_id, new_display_name, changed_at) VALUES (?1, ?2, ?3, ?4)",
            (&change.guild_id, &change.user_id, &change.new_display_name, ts),
        )
        .context("writing name change")?;
        histogram!("persist_put_ms", started.elapsed().as_secs_f64() * 1000.0);
        counter!("persist_put_total", 1u64);
        Ok(())
    }

    fn history(&self, guild_id: &str, user_id: &str) -> Result<Vec<NameHistoryEntry>> {
        let started = std::time::Instant::now();
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, new_display_name, changed_at FROM names
             WHERE guild_id = ?1 AND user_id = ?2
             ORDER BY changed_at DESC, id DESC",
        )?;
        let mut rows = stmt.query((guild_id, user_id)).context("querying name history")?;
        let mut out: Vec<NameHistoryEntry> = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(NameHistoryEntry {
                id: row.get(0)?,
                guild_id: guild_id.to_string(),
                user_id: user_id.to_string(),
                new_display_name: row.get(1)?,
                changed_at: row.get(2)?,
            });
        }
        histogram!("persist_get_ms", started.elapsed().as_secs_f64() * 1000.0);
        Ok(out)
    }
}

fn default_db_path() -> String {
    if let Some(home) = std::env::var_os("HOME") {
        let mut p = std::path::PathBuf::from(home);
        p.push(".juicebot");
        let _ = std::fs::create_dir_all(&p);
        p.push("juicebot.db");
        return p.to_string_lossy().to_string();
    }
    "juicebot.db".to_string()
}

pub fn now_ts() -> i64 {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    now.as_secs() as i64
}
