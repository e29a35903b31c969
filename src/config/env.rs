//! `TABOO_*` environment variable overrides. Values that fail to parse are
//! ignored so a stray variable cannot take the service down.

use super::{duration, Config, ConfigDuration};

pub fn apply(cfg: &mut Config) {
    string(&mut cfg.environment, "TABOO_ENVIRONMENT");

    string(&mut cfg.server.host, "TABOO_SERVER_HOST");
    parsed(&mut cfg.server.port, "TABOO_SERVER_PORT");
    dur(&mut cfg.server.read_timeout, "TABOO_SERVER_READ_TIMEOUT");
    dur(&mut cfg.server.write_timeout, "TABOO_SERVER_WRITE_TIMEOUT");
    dur(
        &mut cfg.server.shutdown_timeout,
        "TABOO_SERVER_SHUTDOWN_TIMEOUT",
    );
    dur(
        &mut cfg.server.request_timeout,
        "TABOO_SERVER_REQUEST_TIMEOUT",
    );
    dur(&mut cfg.server.sse_heartbeat, "TABOO_SERVER_SSE_HEARTBEAT");
    parsed(&mut cfg.server.rate_limit, "TABOO_SERVER_RATE_LIMIT");
    parsed(&mut cfg.server.rate_burst, "TABOO_SERVER_RATE_BURST");
    if let Ok(v) = std::env::var("TABOO_SERVER_CORS_ORIGINS") {
        cfg.server.cors_origins = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    dur(&mut cfg.game.draw_duration, "TABOO_GAME_DRAW_DURATION");
    dur(&mut cfg.game.wait_duration, "TABOO_GAME_WAIT_DURATION");
    parsed(&mut cfg.game.pick_count, "TABOO_GAME_PICK_COUNT");
    parsed(&mut cfg.game.max_number, "TABOO_GAME_MAX_NUMBER");

    string(&mut cfg.database.driver, "TABOO_DATABASE_DRIVER");
    string(&mut cfg.database.dsn, "TABOO_DATABASE_DSN");

    string(&mut cfg.logging.level, "TABOO_LOGGING_LEVEL");
    string(&mut cfg.logging.format, "TABOO_LOGGING_FORMAT");
}

fn string(target: &mut String, key: &str) {
    if let Ok(v) = std::env::var(key) {
        if !v.is_empty() {
            *target = v;
        }
    }
}

fn parsed<T: std::str::FromStr>(target: &mut T, key: &str) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(parsed) = v.parse() {
            *target = parsed;
        }
    }
}

fn dur(target: &mut ConfigDuration, key: &str) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(parsed) = duration::parse(&v) {
            *target = ConfigDuration(parsed);
        }
    }
}
