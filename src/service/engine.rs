//! The round engine: a single cooperative loop that draws picks, persists
//! the round, and broadcasts the reveal sequence.

use super::GameService;
use crate::config::GameConfig;
use crate::domain::Game;
use crate::sdk::GameStateEvent;
use crate::store::StoreError;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct Engine {
    service: Arc<GameService>,
    config: GameConfig,
    running: AtomicBool,
}

impl Engine {
    pub fn new(service: Arc<GameService>, config: GameConfig) -> Self {
        Self {
            service,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Whether the loop is currently running; consulted by the readiness
    /// probe.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Force the running flag, for tests that exercise readiness without a
    /// live loop.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    /// Run the game loop until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        self.running.store(true, Ordering::Relaxed);

        info!(
            draw_duration = ?self.config.draw_duration.duration(),
            wait_duration = ?self.config.wait_duration.duration(),
            pick_count = self.config.pick_count,
            max_number = self.config.max_number,
            "game engine started"
        );

        loop {
            match self.run_cycle(&mut shutdown).await {
                Ok(Cycle::Continue) => {}
                Ok(Cycle::Shutdown) => break,
                Err(err) => {
                    warn!(error = %err, "game cycle failed");
                    // Back off before retrying so a broken store does not
                    // spin the loop.
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        () = tokio::time::sleep(self.config.wait_duration.duration()) => {}
                    }
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
        info!("game engine stopped");
    }

    /// One cycle: draw -> reveal every pick -> complete -> wait.
    async fn run_cycle(&self, shutdown: &mut broadcast::Receiver<()>) -> Result<Cycle, StoreError> {
        let picks = self.generate_picks();

        let draw_duration = self.config.draw_duration.duration();
        let wait_duration = self.config.wait_duration.duration();
        let pick_interval = draw_duration / self.config.pick_count as u32;
        let next_game = Utc::now()
            + chrono::Duration::from_std(draw_duration + wait_duration)
                .unwrap_or(chrono::Duration::zero());

        let id = match self.service.latest_game().await {
            Ok(latest) => latest.id + 1,
            Err(StoreError::NotFound) => 1,
            Err(err) => return Err(err),
        };

        // Persist with the full pick sequence before anything is broadcast.
        let game = Game::new(id, picks.clone());
        self.service.create_game(&game).await?;
        self.service.set_active_game_id(id);

        info!(game_id = id, picks = picks.len(), "game started");

        self.service.broadcast_state(GameStateEvent {
            game_id: id,
            picks: Vec::new(),
            next_game,
        });

        for (i, &pick) in picks.iter().enumerate() {
            tokio::select! {
                _ = shutdown.recv() => return Ok(Cycle::Shutdown),
                () = tokio::time::sleep(pick_interval) => {
                    self.service.broadcast_pick(pick);
                    // Late joiners resync from the prefix state.
                    self.service.broadcast_state(GameStateEvent {
                        game_id: id,
                        picks: picks[..=i].to_vec(),
                        next_game,
                    });
                }
            }
        }

        info!(game_id = id, "game complete");
        self.service.broadcast_complete(id);

        tokio::select! {
            _ = shutdown.recv() => Ok(Cycle::Shutdown),
            () = tokio::time::sleep(wait_duration) => Ok(Cycle::Continue),
        }
    }

    /// Unique picks via a Fisher-Yates shuffle of the full pool, from a
    /// cryptographically secure source.
    fn generate_picks(&self) -> Vec<u8> {
        let mut pool: Vec<u8> = (1..=self.config.max_number).collect();
        for i in (1..pool.len()).rev() {
            let j = OsRng.gen_range(0..=i);
            pool.swap(i, j);
        }
        pool.truncate(self.config.pick_count);
        pool
    }
}

enum Cycle {
    Continue,
    Shutdown,
}
