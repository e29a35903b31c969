//! Wire types shared by the server handlers and the client SDK.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SSE event names.
pub const EVENT_GAME_STATE: &str = "game:state";
pub const EVENT_GAME_PICK: &str = "game:pick";
pub const EVENT_GAME_COMPLETE: &str = "game:complete";
pub const EVENT_GAME_HEARTBEAT: &str = "game:heartbeat";

/// A game in API responses. `picks` is a JSON array of integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub picks: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl From<crate::domain::Game> for Game {
    fn from(game: crate::domain::Game) -> Self {
        Self {
            id: game.id,
            picks: game.picks,
            created_at: game.created_at,
        }
    }
}

/// Response of `GET /api/v1/games`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameListResponse {
    pub games: Vec<Game>,
    /// Start id of the next page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i64>,
}

/// Standard error body: `{"error":{"code":..,"message":..}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Snapshot for newly connected or post-reveal clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateEvent {
    pub game_id: i64,
    /// The revealed prefix so far; empty at round start.
    pub picks: Vec<u8>,
    pub next_game: DateTime<Utc>,
}

/// A single newly revealed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePickEvent {
    pub pick: u8,
}

/// The active round finished revealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCompleteEvent {
    pub game_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_event_wire_shape() {
        let event = GameStateEvent {
            game_id: 42,
            picks: vec![1, 2, 3],
            next_game: "2025-01-01T00:00:00Z".parse().unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "game_id": 42,
                "picks": [1, 2, 3],
                "next_game": "2025-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn next_cursor_is_omitted_when_absent() {
        let resp = GameListResponse {
            games: Vec::new(),
            next_cursor: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("next_cursor"));

        let resp = GameListResponse {
            games: Vec::new(),
            next_cursor: Some(3),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"next_cursor\":3"));
    }

    #[test]
    fn error_response_round_trips() {
        let raw = r#"{"error":{"code":"NOT_FOUND","message":"game 42 not found"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.code, "NOT_FOUND");
        assert_eq!(parsed.error.message, "game 42 not found");
    }
}
