//! Client SDK: REST calls, the SSE streaming consumer, and a channel-shaped
//! consumer for select-style event loops.

mod channel;
mod client;
mod dto;
mod sse;

pub use channel::{channel, ChannelEvents, ChannelHandler, SdkGameEvent};
pub use client::{Client, Error, ListGamesOptions};
pub use dto::{
    ErrorDetail, ErrorResponse, Game, GameCompleteEvent, GameListResponse, GamePickEvent,
    GameStateEvent, EVENT_GAME_COMPLETE, EVENT_GAME_HEARTBEAT, EVENT_GAME_PICK, EVENT_GAME_STATE,
};
pub use sse::{EventHandler, SseClient};
