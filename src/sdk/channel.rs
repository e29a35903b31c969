//! Channel-shaped event consumer: instead of callbacks, events arrive on a
//! bounded channel so the caller can write a `select!` loop.

use super::dto::{GameCompleteEvent, GamePickEvent, GameStateEvent};
use super::sse::EventHandler;
use super::Error;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// All stream events as one sum type.
#[derive(Debug, Clone, PartialEq)]
pub enum SdkGameEvent {
    State(GameStateEvent),
    Pick(GamePickEvent),
    Complete(GameCompleteEvent),
    Heartbeat,
}

/// The handler half: pass to [`SseClient::run`](super::SseClient::run).
/// Delivery is non-blocking; events past a full buffer are dropped, matching
/// the server's own slow-subscriber policy.
pub struct ChannelHandler {
    events: mpsc::Sender<SdkGameEvent>,
    connects: mpsc::Sender<()>,
    disconnects: mpsc::Sender<Option<String>>,
}

/// The receiver half, owned by the consuming task.
pub struct ChannelEvents {
    pub events: mpsc::Receiver<SdkGameEvent>,
    pub connects: mpsc::Receiver<()>,
    /// Carries the error message of a failed connection, `None` for a clean
    /// server-side close.
    pub disconnects: mpsc::Receiver<Option<String>>,
}

/// Create a connected handler/receiver pair with the given event buffer.
pub fn channel(buffer: usize) -> (ChannelHandler, ChannelEvents) {
    let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
    let (connects_tx, connects_rx) = mpsc::channel(1);
    let (disconnects_tx, disconnects_rx) = mpsc::channel(1);
    (
        ChannelHandler {
            events: events_tx,
            connects: connects_tx,
            disconnects: disconnects_tx,
        },
        ChannelEvents {
            events: events_rx,
            connects: connects_rx,
            disconnects: disconnects_rx,
        },
    )
}

impl ChannelHandler {
    fn push(&self, event: SdkGameEvent) {
        let _ = self.events.try_send(event);
    }
}

#[async_trait]
impl EventHandler for ChannelHandler {
    async fn on_game_state(&self, event: GameStateEvent) {
        self.push(SdkGameEvent::State(event));
    }

    async fn on_game_pick(&self, event: GamePickEvent) {
        self.push(SdkGameEvent::Pick(event));
    }

    async fn on_game_complete(&self, event: GameCompleteEvent) {
        self.push(SdkGameEvent::Complete(event));
    }

    async fn on_heartbeat(&self) {
        self.push(SdkGameEvent::Heartbeat);
    }

    async fn on_connect(&self) {
        let _ = self.connects.try_send(());
    }

    async fn on_disconnect(&self, error: Option<&Error>) {
        let _ = self.disconnects.try_send(error.map(ToString::to_string));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_events_in_order() {
        let (handler, mut rx) = channel(8);

        handler.on_game_pick(GamePickEvent { pick: 5 }).await;
        handler.on_heartbeat().await;
        handler
            .on_game_complete(GameCompleteEvent { game_id: 2 })
            .await;

        assert_eq!(
            rx.events.recv().await,
            Some(SdkGameEvent::Pick(GamePickEvent { pick: 5 }))
        );
        assert_eq!(rx.events.recv().await, Some(SdkGameEvent::Heartbeat));
        assert_eq!(
            rx.events.recv().await,
            Some(SdkGameEvent::Complete(GameCompleteEvent { game_id: 2 }))
        );
    }

    #[tokio::test]
    async fn drops_events_when_buffer_full() {
        let (handler, mut rx) = channel(1);

        handler.on_game_pick(GamePickEvent { pick: 1 }).await;
        handler.on_game_pick(GamePickEvent { pick: 2 }).await; // dropped

        assert_eq!(
            rx.events.recv().await,
            Some(SdkGameEvent::Pick(GamePickEvent { pick: 1 }))
        );
        assert!(rx.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn signals_connect_and_disconnect() {
        let (handler, mut rx) = channel(1);

        handler.on_connect().await;
        handler.on_disconnect(None).await;

        assert_eq!(rx.connects.recv().await, Some(()));
        assert_eq!(rx.disconnects.recv().await, Some(None));
    }
}
