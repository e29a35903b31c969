use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use taboo::config::Config;
use taboo::lifecycle::ShutdownCoordinator;
use taboo::server::ratelimit::{RateLimiter, CLEANUP_INTERVAL};
use taboo::server::{self, AppState};
use taboo::service::{Engine, GameService};
use taboo::store::{SqliteStore, Store};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Taboo: real-time keno-style rounds over SSE.
#[derive(Parser, Debug)]
#[command(name = "taboo", version, about)]
struct Cli {
    /// Path to a TOML config file. `TABOO_*` environment variables override
    /// file values.
    #[arg(short, long, default_value = "taboo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the game engine and HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(Some(&cli.config)).context("loading configuration")?;

    init_tracing(&config);

    match cli.command {
        Commands::Serve => serve(config).await,
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let store: Arc<dyn Store> =
        Arc::new(SqliteStore::open(&config.database.dsn).context("opening store")?);
    info!(dsn = %config.database.dsn, "store ready");

    let service = Arc::new(GameService::new(Arc::clone(&store)));
    let engine = Arc::new(Engine::new(Arc::clone(&service), config.game.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(
        config.server.rate_limit,
        config.server.rate_burst,
    ));
    let shutdown = ShutdownCoordinator::new();

    let engine_task = {
        let engine = Arc::clone(&engine);
        let rx = shutdown.subscribe();
        tokio::spawn(async move { engine.run(rx).await })
    };

    let eviction_task = tokio::spawn(
        Arc::clone(&rate_limiter).run_eviction(CLEANUP_INTERVAL, shutdown.subscribe()),
    );

    let state = AppState {
        config: Arc::clone(&config),
        store,
        service,
        engine,
        rate_limiter,
        shutdown: shutdown.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.server.addr())
        .await
        .with_context(|| format!("binding {}", config.server.addr()))?;

    let server_task = {
        let app = server::router(state);
        let shutdown = shutdown.clone();
        let drain = config.server.shutdown_timeout.duration();
        tokio::spawn(async move { server::serve(listener, app, shutdown, drain).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("installing ctrl-c handler")?;
    info!("shutdown signal received");
    shutdown.shutdown();

    server_task.await.context("joining server task")??;
    engine_task.await.context("joining engine task")?;
    eviction_task.await.context("joining eviction task")?;

    info!("goodbye");
    Ok(())
}
