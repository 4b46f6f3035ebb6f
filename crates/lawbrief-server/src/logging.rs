use std::{
    collections::VecDeque,
    fmt::Write,
    sync::{Arc, Mutex},
};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::field::{Field, Visit};

/// Log lines kept for clients that connect after the fact.
pub(crate) const RING_CAPACITY: usize = 500;

/// Mirrors tracing events as JSON lines into a ring buffer and a broadcast
/// channel, which `/api/logs` replays and then streams.
pub(crate) struct BroadcastLayer {
    pub tx: broadcast::Sender<String>,
    pub ring: Arc<Mutex<VecDeque<String>>>,
}

/// One line of the log viewer.
#[derive(Serialize)]
struct LogLine<'a> {
    ts: i64,
    level: &'a str,
    category: &'a str,
    message: String,
    /// Structured fields such as `session` or `chunks`, by name.
    #[serde(skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl LineVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            match value {
                Value::String(s) => self.message = s,
                other => self.message = other.to_string(),
            }
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    // `%display` fields and the message itself arrive here already formatted.
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut text = String::new();
        let _ = write!(text, "{value:?}");
        self.insert(field, Value::String(text));
    }
}

/// Coarse grouping for the log viewer, keyed off the event's module path.
pub(crate) fn category(target: &str) -> &'static str {
    if target.contains("summarize") || target.contains("qa") || target.contains("groq") {
        "llm"
    } else if target.contains("gdpr") || target.contains("sheets") {
        "regulatory"
    } else if target.contains("mail") {
        "mail"
    } else if target.contains("pipeline") || target.contains("extract") {
        "analysis"
    } else {
        "system"
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for BroadcastLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = match *event.metadata().level() {
            tracing::Level::ERROR => "err",
            tracing::Level::WARN => "warn",
            tracing::Level::INFO => "info",
            tracing::Level::DEBUG => "debug",
            tracing::Level::TRACE => return,
        };

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let line = LogLine {
            ts: chrono::Utc::now().timestamp(),
            level,
            category: category(event.metadata().target()),
            message: visitor.message,
            fields: visitor.fields,
        };
        let Ok(json) = serde_json::to_string(&line) else {
            return;
        };

        let _ = self.tx.send(json.clone());
        if let Ok(mut ring) = self.ring.lock() {
            ring.push_back(json);
            if ring.len() > RING_CAPACITY {
                ring.pop_front();
            }
        }
    }
}

/// Buffered lines followed by live ones. Subscribes before reading the ring
/// so nothing logged in between is lost; lagged receivers skip ahead.
pub(crate) fn log_stream(
    tx: &broadcast::Sender<String>,
    ring: &Mutex<VecDeque<String>>,
) -> impl Stream<Item = String> {
    let live = BroadcastStream::new(tx.subscribe()).filter_map(Result::ok);
    let history: Vec<String> = ring
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .cloned()
        .collect();
    tokio_stream::iter(history).chain(live)
}
