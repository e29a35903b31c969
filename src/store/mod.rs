//! Round persistence. The [`Store`] trait is the capability handed to the
//! game service and engine; tests construct their own implementation or an
//! in-memory SQLite store.

use crate::domain::Game;
use async_trait::async_trait;

pub mod sqlite;

pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("game {0} already exists")]
    AlreadyExists(i64),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("store task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Succeeds iff the underlying connection is healthy.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Persist a new game. Fails with [`StoreError::AlreadyExists`] if the
    /// id is taken.
    async fn create_game(&self, game: &Game) -> Result<(), StoreError>;

    async fn get_game(&self, id: i64) -> Result<Game, StoreError>;

    /// The game with the largest id.
    async fn latest_game(&self) -> Result<Game, StoreError>;

    /// Games with `id >= start_id`, ascending, at most `limit` entries.
    async fn list_games(&self, start_id: i64, limit: usize) -> Result<Vec<Game>, StoreError>;
}
