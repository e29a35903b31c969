//! The SSE endpoint: one select loop per connection multiplexing shutdown,
//! heartbeat ticks, and broker events. The stream is the only writer for its
//! connection; axum flushes after every event.

use super::AppState;
use crate::sdk::EVENT_GAME_HEARTBEAT;
use async_stream::stream;
use axum::extract::State;
use axum::http::header::{HeaderName, CACHE_CONTROL};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use std::convert::Infallible;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

enum Step {
    Emit(Event),
    Skip,
    End,
}

/// GET /api/v1/events
pub async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let mut sub = state.service.subscribe();
    let mut shutdown = state.shutdown.subscribe();
    let heartbeat_period = state.config.server.sse_heartbeat.duration();

    debug!("SSE client connected");

    let stream = stream! {
        // First heartbeat a full interval after connect, then steady cadence.
        let mut heartbeat = interval_at(Instant::now() + heartbeat_period, heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // `yield` cannot live inside select! arms, so each arm reduces
            // to a Step handled below.
            let step = tokio::select! {
                _ = shutdown.recv() => Step::End,
                _ = heartbeat.tick() => {
                    Step::Emit(Event::default().event(EVENT_GAME_HEARTBEAT).data("{}"))
                }
                event = sub.recv() => match event {
                    Some(event) => match event.data() {
                        Ok(data) => Step::Emit(Event::default().event(event.kind()).data(data)),
                        Err(err) => {
                            warn!(error = %err, "failed to encode game event");
                            Step::Skip
                        }
                    },
                    None => Step::End,
                },
            };

            match step {
                Step::Emit(event) => yield Ok::<_, Infallible>(event),
                Step::Skip => {}
                Step::End => break,
            }
        }

        debug!("SSE client disconnected");
        // Dropping the stream drops `sub`, which unregisters the subscriber.
    };

    (
        [
            (CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
}
