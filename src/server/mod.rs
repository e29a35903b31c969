//! HTTP surface: state, router, middleware wiring, and the serve loop with
//! bounded graceful drain.

use crate::config::Config;
use crate::lifecycle::ShutdownCoordinator;
use crate::service::{Engine, GameService};
use crate::store::Store;
use anyhow::Result;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tracing::{info, warn};

pub mod error;
pub mod events;
pub mod games;
pub mod health;
pub mod middleware;
pub mod ratelimit;

use self::middleware::{
    cors, handle_panic, rate_limit, request_log, request_timeout, CorsSettings, RequestLogSettings,
};
use self::ratelimit::RateLimiter;

pub const SSE_PATH: &str = "/api/v1/events";
const QUIET_PATHS: &[&str] = &["/livez", "/readyz"];

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub service: Arc<GameService>,
    pub engine: Arc<Engine>,
    pub rate_limiter: Arc<RateLimiter>,
    pub shutdown: ShutdownCoordinator,
}

/// Build the full middleware-wrapped router.
///
/// Composition, outermost first: recoverer, CORS, rate limit, gzip, timeout,
/// request logging, routes. The SSE route is merged in past the gzip and
/// timeout layers: compression would buffer the per-event flushes and a
/// request deadline would kill the long-lived stream.
pub fn router(state: AppState) -> Router {
    let log_settings = Arc::new(RequestLogSettings::new(QUIET_PATHS));
    let cors_settings = Arc::new(CorsSettings::new(
        state.config.is_development(),
        &state.config.server.cors_origins,
    ));
    let request_timeout_after = state.config.server.request_timeout.duration();

    let api = Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .route("/api/v1/games", get(games::list_games))
        .route("/api/v1/games/{id}", get(games::get_game))
        .layer(from_fn_with_state(Arc::clone(&log_settings), request_log))
        .layer(from_fn_with_state(request_timeout_after, request_timeout))
        .layer(CompressionLayer::new());

    let sse = Router::new()
        .route(SSE_PATH, get(events::events))
        .layer(from_fn_with_state(log_settings, request_log));

    Router::new()
        .merge(api)
        .merge(sse)
        .layer(from_fn_with_state(
            Arc::clone(&state.rate_limiter),
            rate_limit,
        ))
        .layer(from_fn_with_state(cors_settings, cors))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// Serve until the coordinator signals shutdown, then drain connections for
/// at most `drain_timeout` before force-closing.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: ShutdownCoordinator,
    drain_timeout: Duration,
) -> Result<()> {
    let mut graceful_rx = shutdown.subscribe();
    let mut drain_rx = shutdown.subscribe();

    info!(addr = %listener.local_addr()?, "http server started");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = graceful_rx.recv().await;
    })
    .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result?;
        }
        _ = drain_rx.recv() => {
            info!(?drain_timeout, "shutting down http server");
            match tokio::time::timeout(drain_timeout, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!("graceful drain timed out, closing remaining connections"),
            }
        }
    }

    info!("http server stopped");
    Ok(())
}
