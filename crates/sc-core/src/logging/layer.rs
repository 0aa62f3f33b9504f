//! Custom tracing layer for JSONL output.
//!
//! Produces one [`LogEvent`] per line on stderr, keeping stdout clean for
//! command payloads.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::{Level, LogEvent, Stage};

/// Correlation data carried by spans or lifted out of event fields.
#[derive(Debug, Clone, Default, PartialEq)]
struct Correlation {
    run_id: Option<String>,
    model_version: Option<String>,
    stage: Option<Stage>,
}

impl Correlation {
    /// Returns false when `name` is not a correlation key.
    fn record(&mut self, name: &str, value: String) -> bool {
        match name {
            "run_id" => self.run_id = Some(value),
            "model_version" => self.model_version = Some(value),
            "stage" => self.stage = value.parse().ok(),
            _ => return false,
        }
        true
    }

    fn fill_from(&mut self, other: &Correlation) {
        if self.run_id.is_none() {
            self.run_id.clone_from(&other.run_id);
        }
        if self.model_version.is_none() {
            self.model_version.clone_from(&other.model_version);
        }
        if self.stage.is_none() {
            self.stage = other.stage;
        }
    }
}

/// Extracts the message, correlation keys, and remaining fields of an event.
#[derive(Default)]
struct JsonFieldVisitor {
    correlation: Correlation,
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn record_text(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else if !self.correlation.record(field.name(), value.clone()) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::String(value));
        }
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let v = serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(value.to_string()));
        self.fields.insert(field.name().to_string(), v);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

/// JSONL tracing layer, stderr by default.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a JSONL layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::default();
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.correlation);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        // Event fields win over the innermost span, which wins over outer spans.
        let mut correlation = visitor.correlation;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<Correlation>() {
                    correlation.fill_from(span_ctx);
                }
            }
        }

        let line = LogEvent {
            ts: Utc::now(),
            level: Level::from(*event.metadata().level()),
            event: event.metadata().target().to_string(),
            run_id: correlation.run_id,
            model_version: correlation.model_version,
            stage: correlation.stage,
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        }
        .to_jsonl();

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
        }
    }
}
