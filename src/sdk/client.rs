//! REST client for the games API.

use super::dto::{ErrorResponse, Game, GameListResponse};
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error {status} ({code}): {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },
    #[error("max retries ({0}) exceeded")]
    RetriesExceeded(u32),
}

/// REST client for the Taboo API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

/// Options for [`Client::list_games`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListGamesOptions {
    pub cursor: Option<i64>,
    pub limit: Option<usize>,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Use a pre-built HTTP client (custom proxies, TLS, timeouts).
    pub fn with_http_client(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retrieve a paginated list of games.
    pub async fn list_games(&self, opts: ListGamesOptions) -> Result<GameListResponse, Error> {
        let mut request = self.http.get(format!("{}/api/v1/games", self.base_url));
        if let Some(cursor) = opts.cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        if let Some(limit) = opts.limit {
            request = request.query(&[("limit", limit as i64)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(parse_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Retrieve a single game by id.
    pub async fn get_game(&self, id: i64) -> Result<Game, Error> {
        let response = self
            .http
            .get(format!("{}/api/v1/games/{id}", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(parse_error(response).await);
        }
        Ok(response.json().await?)
    }
}

pub(super) async fn parse_error(response: reqwest::Response) -> Error {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => Error::Api {
            status,
            code: body.error.code,
            message: body.error.message,
        },
        Err(_) => Error::Api {
            status,
            code: "unknown".into(),
            message: format!("HTTP {status}"),
        },
    }
}
