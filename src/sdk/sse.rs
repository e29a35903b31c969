//! Streaming SSE consumer: connect, parse the event stream, dispatch typed
//! events, reconnect with a fixed delay.

use super::client::parse_error;
use super::dto::{
    GameCompleteEvent, GamePickEvent, GameStateEvent, EVENT_GAME_COMPLETE, EVENT_GAME_HEARTBEAT,
    EVENT_GAME_PICK, EVENT_GAME_STATE,
};
use super::Error;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header;
use std::time::Duration;

/// Callbacks for the event stream. Every method has a no-op default, so a
/// handler implements only what it needs.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_game_state(&self, _event: GameStateEvent) {}
    async fn on_game_pick(&self, _event: GamePickEvent) {}
    async fn on_game_complete(&self, _event: GameCompleteEvent) {}
    async fn on_heartbeat(&self) {}
    async fn on_connect(&self) {}
    async fn on_disconnect(&self, _error: Option<&Error>) {}
}

/// Connects to `/api/v1/events` and dispatches events to an [`EventHandler`].
#[derive(Debug, Clone)]
pub struct SseClient {
    base_url: String,
    http: reqwest::Client,
    reconnect_delay: Duration,
    /// 0 = reconnect forever.
    max_retries: u32,
}

impl SseClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            // No request timeout: the stream is expected to stay open.
            http: reqwest::Client::new(),
            reconnect_delay: Duration::from_secs(5),
            max_retries: 0,
        }
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Give up after `n` failed or dropped connections. 0 keeps retrying.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Connect and process events until the caller drops this future. Each
    /// stream termination triggers `on_disconnect`, a delay, and a
    /// reconnect, until `max_retries` is exhausted.
    pub async fn run<H: EventHandler>(&self, handler: &H) -> Result<(), Error> {
        let mut retries = 0u32;
        loop {
            let result = self.connect_once(handler).await;
            handler.on_disconnect(result.as_ref().err()).await;

            retries += 1;
            if self.max_retries > 0 && retries >= self.max_retries {
                return Err(Error::RetriesExceeded(self.max_retries));
            }

            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// One connection: returns `Ok` when the server closes the stream.
    async fn connect_once<H: EventHandler>(&self, handler: &H) -> Result<(), Error> {
        let response = self
            .http
            .get(format!("{}/api/v1/events", self.base_url))
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(parse_error(response).await);
        }

        handler.on_connect().await;

        let mut parser = SseParser::default();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            for event in parser.feed(&chunk?) {
                dispatch(handler, &event).await;
            }
        }

        Ok(())
    }
}

async fn dispatch<H: EventHandler>(handler: &H, raw: &RawEvent) {
    match raw.event.as_str() {
        EVENT_GAME_STATE => {
            if let Ok(event) = serde_json::from_str(&raw.data) {
                handler.on_game_state(event).await;
            }
        }
        EVENT_GAME_PICK => {
            if let Ok(event) = serde_json::from_str(&raw.data) {
                handler.on_game_pick(event).await;
            }
        }
        EVENT_GAME_COMPLETE => {
            if let Ok(event) = serde_json::from_str(&raw.data) {
                handler.on_game_complete(event).await;
            }
        }
        EVENT_GAME_HEARTBEAT => handler.on_heartbeat().await,
        // Unknown event types are skipped so the protocol can grow.
        _ => {}
    }
}

/// One parsed frame: the `event:` name and the joined `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RawEvent {
    pub event: String,
    pub data: String,
}

/// Incremental SSE frame parser. Feed arbitrary chunk boundaries; complete
/// events come out as they are terminated by a blank line.
#[derive(Debug, Default)]
pub(super) struct SseParser {
    buf: Vec<u8>,
    event: String,
    data: String,
}

impl SseParser {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            self.handle_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<RawEvent>) {
        if line.is_empty() {
            if !self.event.is_empty() && !self.data.is_empty() {
                events.push(RawEvent {
                    event: std::mem::take(&mut self.event),
                    data: std::mem::take(&mut self.data),
                });
            }
            self.event.clear();
            self.data.clear();
            return;
        }

        if let Some(rest) = line.strip_prefix("event:") {
            self.event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(rest.trim());
        }
        // id:, retry:, and ":" comments are ignored.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn parses_a_single_event() {
        let mut parser = SseParser::default();
        let events = parser.feed(b"event: game:pick\ndata: {\"pick\":7}\n\n");
        assert_eq!(
            events,
            vec![RawEvent {
                event: "game:pick".into(),
                data: "{\"pick\":7}".into(),
            }]
        );
    }

    #[test]
    fn joins_multi_line_data() {
        let mut parser = SseParser::default();
        let events = parser.feed(b"event: x\ndata: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn ignores_comments_id_and_retry() {
        let mut parser = SseParser::default();
        let events =
            parser.feed(b": keepalive\nid: 9\nretry: 1000\nevent: x\ndata: {}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "x");
        assert_eq!(events[0].data, "{}");
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut parser = SseParser::default();
        let events = parser.feed(b"event: x\r\ndata: {}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "x");
    }

    #[test]
    fn reassembles_across_chunk_boundaries() {
        let mut parser = SseParser::default();
        assert!(parser.feed(b"event: game:c").is_empty());
        assert!(parser.feed(b"omplete\ndata: {\"game_id\"").is_empty());
        let events = parser.feed(b":3}\n\n");
        assert_eq!(events[0].event, "game:complete");
        assert_eq!(events[0].data, "{\"game_id\":3}");
    }

    #[test]
    fn event_without_data_is_dropped() {
        let mut parser = SseParser::default();
        let events = parser.feed(b"event: x\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn multiple_events_in_one_chunk() {
        let mut parser = SseParser::default();
        let events = parser.feed(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "a");
        assert_eq!(events[1].event, "b");
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn on_game_state(&self, event: GameStateEvent) {
            self.calls.lock().push(format!("state:{}", event.game_id));
        }
        async fn on_game_pick(&self, event: GamePickEvent) {
            self.calls.lock().push(format!("pick:{}", event.pick));
        }
        async fn on_game_complete(&self, event: GameCompleteEvent) {
            self.calls.lock().push(format!("complete:{}", event.game_id));
        }
        async fn on_heartbeat(&self) {
            self.calls.lock().push("heartbeat".into());
        }
    }

    #[tokio::test]
    async fn dispatches_by_event_type() {
        let recorder = Recorder::default();

        for raw in [
            RawEvent {
                event: "game:pick".into(),
                data: r#"{"pick":12}"#.into(),
            },
            RawEvent {
                event: "game:complete".into(),
                data: r#"{"game_id":4}"#.into(),
            },
            RawEvent {
                event: "game:heartbeat".into(),
                data: "{}".into(),
            },
            RawEvent {
                event: "game:future".into(),
                data: "{}".into(),
            },
        ] {
            dispatch(&recorder, &raw).await;
        }

        assert_eq!(
            *recorder.calls.lock(),
            vec!["pick:12", "complete:4", "heartbeat"]
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_skipped() {
        let recorder = Recorder::default();
        dispatch(
            &recorder,
            &RawEvent {
                event: "game:pick".into(),
                data: "not json".into(),
            },
        )
        .await;
        assert!(recorder.calls.lock().is_empty());
    }
}
