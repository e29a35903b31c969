//! SQLite-backed round store.
//!
//! WAL journal mode with one writer connection and a small set of reader
//! connections, each behind its own mutex. SQLite calls are blocking, so
//! every operation runs on the blocking thread pool. Migrations run once at
//! open under `PRAGMA user_version`; a failed migration fails the open.

use super::{Store, StoreError};
use crate::domain::Game;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_READER_COUNT: usize = 2;

const MIGRATIONS: &[&str] = &[
    // v1: the games table. Picks are a JSON integer array in a TEXT column,
    // readable with plain sqlite tooling.
    "CREATE TABLE games (
        game_id    INTEGER PRIMARY KEY,
        picks      TEXT NOT NULL,
        created_at TEXT NOT NULL
     );",
];

pub struct SqliteStore {
    pool: Arc<Pool>,
}

struct Pool {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if necessary) the database at `dsn` and run migrations.
    pub fn open(dsn: &str) -> Result<Self> {
        // A memory database is per-connection, so it gets no reader pool;
        // reads fall back to the writer connection.
        let reader_count = if dsn == ":memory:" {
            0
        } else {
            DEFAULT_READER_COUNT
        };

        if dsn != ":memory:" {
            if let Some(parent) = Path::new(dsn).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating database dir {}", parent.display()))?;
                }
            }
        }

        let writer = open_connection(dsn)?;
        migrate(&writer).context("running migrations")?;

        let mut readers = Vec::with_capacity(reader_count);
        for _ in 0..reader_count {
            readers.push(Mutex::new(open_connection(dsn)?));
        }

        Ok(Self {
            pool: Arc::new(Pool {
                writer: Mutex::new(writer),
                readers,
            }),
        })
    }

    async fn with_write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || f(&pool.writer.lock()))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn with_read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            for reader in &pool.readers {
                if let Some(conn) = reader.try_lock() {
                    return f(&conn);
                }
            }
            // All readers busy (or none exist): take whichever frees up first.
            match pool.readers.first() {
                Some(reader) => f(&reader.lock()),
                None => f(&pool.writer.lock()),
            }
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn open_connection(dsn: &str) -> Result<Connection> {
    let conn = Connection::open(dsn).with_context(|| format!("opening database {dsn}"))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous  = NORMAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;",
    )
    .context("applying pragmas")?;
    Ok(conn)
}

fn migrate(conn: &Connection) -> Result<()> {
    let version: usize =
        conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))? as usize;

    for (i, migration) in MIGRATIONS.iter().enumerate().skip(version) {
        let target = i + 1;
        conn.execute_batch(&format!("BEGIN; {migration} COMMIT;"))
            .with_context(|| format!("migration to schema version {target}"))?;
        conn.pragma_update(None, "user_version", target as i64)?;
    }

    Ok(())
}

fn row_to_game(id: i64, picks: String, created_at: String) -> Result<Game, StoreError> {
    let picks: Vec<u8> = serde_json::from_str(&picks)
        .map_err(|e| StoreError::Corrupt(format!("picks for game {id}: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Corrupt(format!("created_at for game {id}: {e}")))?
        .with_timezone(&Utc);

    Ok(Game {
        id,
        picks,
        created_at,
    })
}

const GAME_COLUMNS: &str = "game_id, picks, created_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.with_read(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    async fn create_game(&self, game: &Game) -> Result<(), StoreError> {
        let id = game.id;
        let picks = serde_json::to_string(&game.picks)
            .map_err(|e| StoreError::Corrupt(format!("encoding picks: {e}")))?;
        let created_at = game.created_at.to_rfc3339();

        self.with_write(move |conn| {
            let result = conn.execute(
                "INSERT INTO games (game_id, picks, created_at) VALUES (?1, ?2, ?3)",
                params![id, picks, created_at],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::AlreadyExists(id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_game(&self, id: i64) -> Result<Game, StoreError> {
        let row = self
            .with_read(move |conn| {
                conn.query_row(
                    &format!("SELECT {GAME_COLUMNS} FROM games WHERE game_id = ?1"),
                    params![id],
                    map_row,
                )
                .optional()
                .map_err(StoreError::from)
            })
            .await?;

        let (id, picks, created_at) = row.ok_or(StoreError::NotFound)?;
        row_to_game(id, picks, created_at)
    }

    async fn latest_game(&self) -> Result<Game, StoreError> {
        let row = self
            .with_read(|conn| {
                conn.query_row(
                    &format!("SELECT {GAME_COLUMNS} FROM games ORDER BY game_id DESC LIMIT 1"),
                    [],
                    map_row,
                )
                .optional()
                .map_err(StoreError::from)
            })
            .await?;

        let (id, picks, created_at) = row.ok_or(StoreError::NotFound)?;
        row_to_game(id, picks, created_at)
    }

    async fn list_games(&self, start_id: i64, limit: usize) -> Result<Vec<Game>, StoreError> {
        let rows = self
            .with_read(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {GAME_COLUMNS} FROM games
                     WHERE game_id >= ?1
                     ORDER BY game_id ASC
                     LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![start_id, limit as i64], map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, picks, created_at)| row_to_game(id, picks, created_at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let dsn = tmp.path().join("taboo.db");
        let store = SqliteStore::open(dsn.to_str().unwrap()).unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let (_tmp, store) = open_temp();
        let game = Game::new(1, vec![7, 3, 9]);

        store.create_game(&game).await.unwrap();
        let loaded = store.get_game(1).await.unwrap();

        assert_eq!(loaded.id, 1);
        assert_eq!(loaded.picks, vec![7, 3, 9]);
        assert_eq!(loaded.created_at, game.created_at);
    }

    #[tokio::test]
    async fn get_is_idempotent() {
        let (_tmp, store) = open_temp();
        store.create_game(&Game::new(1, vec![5])).await.unwrap();

        let a = store.get_game(1).await.unwrap();
        let b = store.get_game(1).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let (_tmp, store) = open_temp();
        store.create_game(&Game::new(3, vec![1])).await.unwrap();

        let err = store.create_game(&Game::new(3, vec![2])).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(3)));
    }

    #[tokio::test]
    async fn missing_game_is_not_found() {
        let (_tmp, store) = open_temp();
        let err = store.get_game(42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn latest_returns_highest_id() {
        let (_tmp, store) = open_temp();
        for id in 1..=3 {
            store
                .create_game(&Game::new(id, vec![id as u8]))
                .await
                .unwrap();
        }

        let latest = store.latest_game().await.unwrap();
        assert_eq!(latest.id, 3);
    }

    #[tokio::test]
    async fn latest_on_empty_store_is_not_found() {
        let (_tmp, store) = open_temp();
        assert!(matches!(
            store.latest_game().await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn list_is_ascending_and_bounded() {
        let (_tmp, store) = open_temp();
        for id in 1..=5 {
            store
                .create_game(&Game::new(id, vec![id as u8]))
                .await
                .unwrap();
        }

        let page = store.list_games(2, 2).await.unwrap();
        assert_eq!(page.iter().map(|g| g.id).collect::<Vec<_>>(), vec![2, 3]);

        let tail = store.list_games(5, 10).await.unwrap();
        assert_eq!(tail.iter().map(|g| g.id).collect::<Vec<_>>(), vec![5]);

        let empty = store.list_games(6, 10).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn ping_succeeds_on_open_store() {
        let (_tmp, store) = open_temp();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let dsn = tmp.path().join("taboo.db");
        let dsn = dsn.to_str().unwrap();

        {
            let store = SqliteStore::open(dsn).unwrap();
            store.create_game(&Game::new(1, vec![9, 9])).await.unwrap();
        }

        let store = SqliteStore::open(dsn).unwrap();
        let game = store.get_game(1).await.unwrap();
        assert_eq!(game.picks, vec![9, 9]);
    }

    #[tokio::test]
    async fn memory_dsn_works() {
        let store = SqliteStore::open(":memory:").unwrap();
        store.create_game(&Game::new(1, vec![1, 2])).await.unwrap();
        assert_eq!(store.get_game(1).await.unwrap().picks, vec![1, 2]);
        store.ping().await.unwrap();
    }
}
