use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single game round: the picks are generated once at creation and revealed
/// one by one by the engine. Rounds are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    /// Ordered, duplicate-free values in `1..=max_number`. Serializes as a
    /// JSON array of integers.
    pub picks: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Game {
    pub fn new(id: i64, picks: Vec<u8>) -> Self {
        Self {
            id,
            picks,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_serialize_as_integer_array() {
        let game = Game::new(1, vec![4, 8, 15]);
        let json = serde_json::to_value(&game).unwrap();
        assert_eq!(json["picks"], serde_json::json!([4, 8, 15]));
        assert_eq!(json["id"], 1);
    }

    #[test]
    fn created_at_is_rfc3339() {
        let game = Game::new(7, vec![1]);
        let json = serde_json::to_string(&game).unwrap();
        let parsed: Game = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.created_at, game.created_at);
    }
}
