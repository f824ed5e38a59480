//! A [`tracing_subscriber`] layer that writes events in `logfmt`
//! (`key=value key2=value2`) form, the format the `qserv` binary uses for
//! both the coordinator and worker processes so that shipped logs are
//! grep-able without a JSON parser.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use observability_deps::tracing::field::{Field, Visit};
use observability_deps::tracing::{Event, Level, Subscriber};
use std::fmt;
use std::io::Write;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// A [`Layer`] that writes one `logfmt` line per event to stdout.
#[derive(Debug, Default)]
pub struct LogFmtLayer;

impl LogFmtLayer {
    /// Construct a new layer.
    pub fn new() -> Self {
        Self
    }
}

struct FieldCollector {
    fields: Vec<(&'static str, String)>,
    message: Option<String>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.push((field.name(), rendered));
        }
    }
}

fn level_str(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        Level::TRACE => "trace",
    }
}

/// Escape a value the way logfmt does: quote it if it contains whitespace
/// or `"`, doubling any embedded quotes.
fn format_value(v: &str) -> String {
    if v.chars().any(|c| c.is_whitespace() || c == '"' || c == '=') {
        format!("\"{}\"", v.replace('"', "\"\""))
    } else {
        v.to_string()
    }
}

impl<S: Subscriber> Layer<S> for LogFmtLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut collector = FieldCollector {
            fields: Vec::new(),
            message: None,
        };
        event.record(&mut collector);

        let mut line = format!(
            "level={} target={}",
            level_str(meta.level()),
            format_value(meta.target())
        );
        if let Some(msg) = collector.message {
            line.push_str(&format!(" msg={}", format_value(&msg)));
        }
        for (k, v) in collector.fields {
            line.push_str(&format!(" {k}={}", format_value(&v)));
        }
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{line}");
    }
}
