//! REST handlers for rounds.

use super::error::ApiError;
use super::AppState;
use crate::sdk::{Game, GameListResponse};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::warn;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    cursor: Option<String>,
    limit: Option<String>,
}

/// GET /api/v1/games: cursor pagination, ascending by id.
pub async fn list_games(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<GameListResponse>, ApiError> {
    let cursor = match params.cursor.as_deref() {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|&c| c >= 0)
            .ok_or_else(|| ApiError::BadRequest("invalid cursor parameter".into()))?,
    };

    let limit = match params.limit.as_deref() {
        None | Some("") => DEFAULT_LIMIT,
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|&l| (1..=MAX_LIMIT).contains(&l))
            .ok_or_else(|| {
                ApiError::BadRequest(format!("limit must be between 1 and {MAX_LIMIT}"))
            })?,
    };

    // Fetch one extra row to learn whether a further page exists.
    let mut games = state
        .service
        .list_games(cursor, limit + 1)
        .await
        .map_err(|err| {
            warn!(error = %err, "listing games failed");
            ApiError::Internal("failed to fetch games".into())
        })?;

    let has_more = games.len() > limit;
    if has_more {
        games.truncate(limit);
    }
    let next_cursor = if has_more {
        games.last().map(|g| g.id + 1)
    } else {
        None
    };

    Ok(Json(GameListResponse {
        games: games.into_iter().map(Game::from).collect(),
        next_cursor,
    }))
}

/// GET /api/v1/games/{id}
pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Game>, ApiError> {
    let id = id
        .parse::<i64>()
        .ok()
        .filter(|&id| id >= 1)
        .ok_or_else(|| ApiError::BadRequest("invalid game ID".into()))?;

    let game = state
        .service
        .get_game(id)
        .await
        .map_err(|err| ApiError::from_store(err, id))?;

    Ok(Json(game.into()))
}
