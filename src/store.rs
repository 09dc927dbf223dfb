use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

use crate::{
    errors::PersistenceError,
    games::{normalize_name, GameCreate, GameRecord},
    platform::Platform,
    storage::{BackendLocal, StorageManager},
};

pub const DB_FILE: &str = "games.db";
pub const JSON_FILE: &str = "games.json";

const MAX_WINDOW_HOURS: u64 = 1_000_000;

type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub total: usize,
    pub saved: usize,
    pub duplicates: usize,
    /// Dropped for lack of a usable url
    pub unusable: usize,
    /// Dropped because the name has no letters or digits
    pub unnamed: usize,
}

impl WriteSummary {
    pub fn merge(&mut self, other: WriteSummary) {
        self.total += other.total;
        self.saved += other.saved;
        self.duplicates += other.duplicates;
        self.unusable += other.unusable;
        self.unnamed += other.unnamed;
    }
}

impl fmt::Display for WriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} saved={} duplicates={} unusable={} unnamed={}",
            self.total, self.saved, self.duplicates, self.unusable, self.unnamed
        )
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub with_iframe: usize,
    pub without_iframe: usize,
    pub per_platform: BTreeMap<String, usize>,
    pub last_collected: Option<DateTime<Utc>>,
}

/// Game records in SQLite, mirrored to a json file on every write.
///
/// Rows are unique per `(source_url, platform)`, re-writing a url replaces its row.
/// Normalized names are unique across platforms.
pub struct GameStore {
    db_path: PathBuf,
    files: BackendLocal,
    write_lock: Mutex<()>,
}

impl GameStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let files = BackendLocal::new(dir.as_ref())?;
        let db_path = dir.as_ref().join(DB_FILE);

        if !db_path.exists() {
            log::info!("Creating new database at {}", db_path.display());
        }

        let store = Self {
            db_path,
            files,
            write_lock: Mutex::new(()),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL,
                source_url TEXT NOT NULL,
                embed_url TEXT NOT NULL DEFAULT '',
                iframe_url TEXT NOT NULL DEFAULT '',
                platform TEXT NOT NULL,
                collected_at TEXT NOT NULL,
                UNIQUE(source_url, platform)
            );
            CREATE INDEX IF NOT EXISTS idx_games_name_key ON games(name_key);
            CREATE INDEX IF NOT EXISTS idx_games_collected_at ON games(collected_at);
        "#,
        )?;
        Ok(())
    }

    /// Persist `records` found on `platform` in one transaction.
    ///
    /// Records without a usable url or without a usable name are dropped. A record
    /// whose normalized name already belongs to another stored game (or to an
    /// earlier record of the batch) counts as a duplicate. Everything else is
    /// upserted, keeping the later of the two `collected_at` values. The json
    /// mirror is rebuilt from the table before commit.
    pub fn write(&self, records: Vec<GameCreate>, platform: Platform) -> Result<WriteSummary> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut summary = WriteSummary {
            total: records.len(),
            ..Default::default()
        };

        let now = Utc::now();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut batch_names = HashSet::new();

        for record in records {
            let platform = record.platform.unwrap_or(platform);
            let source_url = record.source_url.trim();
            let name_key = normalize_name(&record.name);

            if record.usable_url().is_none() || source_url.is_empty() {
                log::debug!(
                    "{platform}: dropping '{}' ({source_url}), no usable url",
                    record.name
                );
                summary.unusable += 1;
                continue;
            }

            if name_key.is_empty() {
                log::debug!("{platform}: dropping {source_url}, name '{}' is blank", record.name);
                summary.unnamed += 1;
                continue;
            }

            let taken: Option<i64> = tx
                .query_row(
                    "SELECT id FROM games WHERE name_key = ?1 AND NOT (source_url = ?2 AND platform = ?3) LIMIT 1",
                    params![name_key, source_url, platform.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            if taken.is_some() || batch_names.contains(&name_key) {
                log::debug!("{platform}: '{}' already collected", record.name);
                summary.duplicates += 1;
                continue;
            }
            batch_names.insert(name_key.clone());

            let game = GameRecord {
                name: record.name.trim().to_string(),
                source_url: source_url.to_string(),
                embed_url: record.embed_url.trim().to_string(),
                iframe_url: record.iframe_url.trim().to_string(),
                platform,
                collected_at: record.collected_at.unwrap_or(now),
            };

            tx.execute(
                r#"
                INSERT INTO games (name, name_key, source_url, embed_url, iframe_url, platform, collected_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(source_url, platform) DO UPDATE SET
                    name = excluded.name,
                    name_key = excluded.name_key,
                    embed_url = excluded.embed_url,
                    iframe_url = excluded.iframe_url,
                    collected_at = MAX(games.collected_at, excluded.collected_at)
                "#,
                params![
                    game.name,
                    name_key,
                    game.source_url,
                    game.embed_url,
                    game.iframe_url,
                    game.platform.as_str(),
                    format_datetime(&game.collected_at),
                ],
            )?;

            summary.saved += 1;
        }

        if summary.saved == 0 {
            tx.commit()?;
            log::debug!("{platform}: write {summary}");
            return Ok(summary);
        }

        // mirror the whole table before commit, a failed mirror rolls the rows back
        let games = select_games(&tx, None, None)?;
        let previous = self.snapshot_json();
        self.mirror(&games)?;

        if let Err(err) = tx.commit() {
            log::error!("{platform}: commit failed, restoring {JSON_FILE}: {err}");
            self.restore_json(previous);
            return Err(err.into());
        }

        log::debug!("{platform}: write {summary}");
        Ok(summary)
    }

    fn mirror(&self, games: &[GameRecord]) -> Result<()> {
        let data = serde_json::to_vec_pretty(games)?;
        self.files.write(JSON_FILE, &data)?;
        Ok(())
    }

    fn snapshot_json(&self) -> Option<Vec<u8>> {
        if !self.files.exists(JSON_FILE) {
            return None;
        }
        self.files.read(JSON_FILE).ok()
    }

    fn restore_json(&self, previous: Option<Vec<u8>>) {
        let restored = match previous {
            Some(data) => self.files.write(JSON_FILE, &data),
            None => self.files.delete(JSON_FILE),
        };
        if let Err(err) = restored {
            log::warn!("failed to restore {JSON_FILE}: {err}");
        }
    }

    fn read_json(&self) -> Vec<GameRecord> {
        if !self.files.exists(JSON_FILE) {
            return vec![];
        }

        let data = match self.files.read(JSON_FILE) {
            Ok(d) => d,
            Err(err) => {
                log::warn!("failed to read {JSON_FILE}: {err}");
                return vec![];
            }
        };

        match serde_json::from_slice(&data) {
            Ok(games) => games,
            Err(err) => {
                log::warn!("{JSON_FILE} is malformed, ignoring it: {err}");
                vec![]
            }
        }
    }

    fn table_is_empty(&self, conn: &Connection) -> Result<bool> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    fn query(&self, platform: Option<Platform>, since: Option<DateTime<Utc>>) -> Result<Vec<GameRecord>> {
        let conn = self.connect()?;

        if self.table_is_empty(&conn)? {
            let mut games: Vec<GameRecord> = self
                .read_json()
                .into_iter()
                .filter(|g| platform.map_or(true, |p| g.platform == p))
                .filter(|g| since.map_or(true, |s| g.collected_at >= s))
                .collect();
            sort_newest_first(&mut games);
            return Ok(games);
        }

        select_games(&conn, platform, since)
    }

    /// All records, newest first.
    pub fn read(&self, platform: Option<Platform>) -> Result<Vec<GameRecord>> {
        self.query(platform, None)
    }

    /// Records collected within the last `hours`, newest first.
    pub fn read_recent(&self, platform: Option<Platform>, hours: u64) -> Result<Vec<GameRecord>> {
        let since = chrono::Duration::try_hours(hours.min(MAX_WINDOW_HOURS) as i64)
            .and_then(|window| Utc::now().checked_sub_signed(window));
        self.query(platform, since)
    }

    /// Normalized names of every stored game, across platforms.
    pub fn existing_names(&self) -> Result<HashSet<String>> {
        Ok(self
            .read(None)?
            .iter()
            .map(|g| normalize_name(&g.name))
            .filter(|key| !key.is_empty())
            .collect())
    }

    /// Case-insensitive substring match on name or source url.
    pub fn search(&self, keyword: &str) -> Result<Vec<GameRecord>> {
        let keyword = keyword.trim().to_lowercase();
        Ok(self
            .read(None)?
            .into_iter()
            .filter(|g| {
                g.name.to_lowercase().contains(&keyword)
                    || g.source_url.to_lowercase().contains(&keyword)
            })
            .collect())
    }

    pub fn statistics(&self) -> Result<StoreStats> {
        let games = self.read(None)?;

        let mut stats = StoreStats {
            total: games.len(),
            ..Default::default()
        };

        for game in &games {
            if game.iframe_url.trim().is_empty() {
                stats.without_iframe += 1;
            } else {
                stats.with_iframe += 1;
            }
            *stats
                .per_platform
                .entry(game.platform.as_str().to_string())
                .or_default() += 1;
        }
        stats.last_collected = games.iter().map(|g| g.collected_at).max();

        Ok(stats)
    }

    /// Irreversibly delete every record from both sinks.
    pub fn clear(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM games", [])?;
        self.files.delete(JSON_FILE)?;

        log::info!("cleared {removed} games");
        Ok(())
    }
}

fn select_games(
    conn: &Connection,
    platform: Option<Platform>,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<GameRecord>> {
    let platform = platform.map(|p| p.as_str().to_string());
    let since = since.map(|s| format_datetime(&s));

    let mut stmt = conn.prepare(
        r#"
        SELECT name, source_url, embed_url, iframe_url, platform, collected_at FROM games
        WHERE (?1 IS NULL OR platform = ?1) AND (?2 IS NULL OR collected_at >= ?2)
        ORDER BY collected_at DESC, id DESC
        "#,
    )?;

    let rows = stmt
        .query_map(params![platform, since], |row| {
            let platform: String = row.get("platform")?;
            let Ok(platform) = platform.parse::<Platform>() else {
                log::warn!("skipping row with unknown platform '{platform}'");
                return Ok(None);
            };

            Ok(Some(GameRecord {
                name: row.get("name")?,
                source_url: row.get("source_url")?,
                embed_url: row.get("embed_url")?,
                iframe_url: row.get("iframe_url")?,
                platform,
                collected_at: parse_datetime(&row.get::<_, String>("collected_at")?),
            }))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().flatten().collect())
}

fn sort_newest_first(games: &mut [GameRecord]) {
    games.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
}

/// Fixed width so that text comparison in SQL orders like time.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(err) => {
            log::warn!("bad collected_at '{s}' ({err}), using epoch");
            DateTime::UNIX_EPOCH
        }
    }
}
