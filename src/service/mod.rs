//! Game domain policy: active-round redaction, event broadcasting.

use crate::domain::Game;
use crate::pubsub::{Broker, Subscription};
use crate::sdk::{
    GameCompleteEvent, GamePickEvent, GameStateEvent, EVENT_GAME_COMPLETE, EVENT_GAME_PICK,
    EVENT_GAME_STATE,
};
use crate::store::{Store, StoreError};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub mod engine;

pub use engine::Engine;

/// A broadcast game event. Heartbeats are synthesized per SSE connection and
/// never pass through the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    State(GameStateEvent),
    Pick(GamePickEvent),
    Complete(GameCompleteEvent),
}

impl GameEvent {
    /// The SSE `event:` name for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::State(_) => EVENT_GAME_STATE,
            GameEvent::Pick(_) => EVENT_GAME_PICK,
            GameEvent::Complete(_) => EVENT_GAME_COMPLETE,
        }
    }

    /// The SSE `data:` payload for this variant.
    pub fn data(&self) -> serde_json::Result<String> {
        match self {
            GameEvent::State(e) => serde_json::to_string(e),
            GameEvent::Pick(e) => serde_json::to_string(e),
            GameEvent::Complete(e) => serde_json::to_string(e),
        }
    }
}

/// Store access plus the one piece of domain policy: picks of the round that
/// is still being revealed are hidden from queries.
pub struct GameService {
    store: Arc<dyn Store>,
    broker: Broker<GameEvent>,
    active_game_id: AtomicI64,
}

impl GameService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            broker: Broker::new(),
            active_game_id: AtomicI64::new(0),
        }
    }

    /// Register an event subscriber. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> Subscription<GameEvent> {
        self.broker.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.broker.subscriber_count()
    }

    pub fn broadcast_state(&self, state: GameStateEvent) {
        self.broker.publish(GameEvent::State(state));
    }

    pub fn broadcast_pick(&self, pick: u8) {
        self.broker.publish(GameEvent::Pick(GamePickEvent { pick }));
    }

    pub fn broadcast_complete(&self, game_id: i64) {
        self.broker
            .publish(GameEvent::Complete(GameCompleteEvent { game_id }));
    }

    /// Called by the engine at the start of each cycle. Queries hide the
    /// picks of this id until the engine moves on.
    pub fn set_active_game_id(&self, id: i64) {
        self.active_game_id.store(id, Ordering::Relaxed);
    }

    pub fn active_game_id(&self) -> i64 {
        self.active_game_id.load(Ordering::Relaxed)
    }

    pub async fn create_game(&self, game: &Game) -> Result<(), StoreError> {
        self.store.create_game(game).await
    }

    pub async fn latest_game(&self) -> Result<Game, StoreError> {
        self.store.latest_game().await
    }

    /// Load a game; the active round comes back with its picks cleared. The
    /// stored row is never mutated.
    pub async fn get_game(&self, id: i64) -> Result<Game, StoreError> {
        let mut game = self.store.get_game(id).await?;
        if game.id == self.active_game_id() {
            game.picks.clear();
        }
        Ok(game)
    }

    /// Cursor listing with the same redaction as [`GameService::get_game`].
    pub async fn list_games(&self, cursor: i64, limit: usize) -> Result<Vec<Game>, StoreError> {
        let mut games = self.store.list_games(cursor, limit).await?;
        let active_id = self.active_game_id();
        for game in &mut games {
            if game.id == active_id {
                game.picks.clear();
            }
        }
        Ok(games)
    }
}
