//! Distributed tracing support for the query engine.
//!
//! A [`SpanContext`] is created once, when a user query arrives at the
//! coordinator, and threaded through every [`crate::span::Span`] created for
//! that query's jobs and merge steps, so that a trace collector can later
//! reconstruct the whole query's timeline.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod span;

pub use span::{Span, SpanContext, SpanEvent, SpanId, SpanRecorder, TraceId};

/// Receives completed [`Span`]s for collection/export.
pub trait TraceCollector: std::fmt::Debug + Send + Sync {
    /// Called once a span has ended.
    fn export(&self, span: Span);
}

/// A [`TraceCollector`] that discards everything — the default when no
/// external collector has been configured.
#[derive(Debug, Default)]
pub struct NoopCollector;

impl TraceCollector for NoopCollector {
    fn export(&self, _span: Span) {}
}
