use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;

use crate::TraceCollector;

/// Identifies one query's trace across every job and merge step it spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceId(pub u128);

/// Identifies one span within a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpanId(pub u64);

impl SpanId {
    fn new_random() -> Self {
        Self(rand::thread_rng().gen())
    }
}

/// Carries the identity needed to create child spans for one query.
///
/// Cheap to clone: internally an `Arc` to the optional collector plus a
/// couple of integers.
#[derive(Debug, Clone)]
pub struct SpanContext {
    /// The query-wide trace id.
    pub trace_id: TraceId,
    /// The id of the span this context was derived from, if any.
    pub parent_span_id: Option<SpanId>,
    collector: Option<Arc<dyn TraceCollector>>,
}

impl SpanContext {
    /// Start a new trace (no parent), e.g. when a user query is first
    /// received by the coordinator.
    pub fn new(collector: Option<Arc<dyn TraceCollector>>) -> Self {
        Self {
            trace_id: TraceId(rand::thread_rng().gen()),
            parent_span_id: None,
            collector,
        }
    }

    /// Create a new child span under this context, e.g. one per dispatched
    /// job.
    pub fn child(&self, name: impl Into<String>) -> Span {
        Span {
            name: name.into(),
            ctx: SpanContext {
                trace_id: self.trace_id,
                parent_span_id: Some(SpanId::new_random()),
                collector: self.collector.clone(),
            },
            start: Utc::now(),
            end: None,
            events: Vec::new(),
        }
    }
}

/// A single timed event recorded against a span (e.g. a job status
/// transition).
#[derive(Debug, Clone)]
pub struct SpanEvent {
    /// Human readable event name.
    pub msg: String,
    /// When the event occurred.
    pub time: DateTime<Utc>,
}

/// A span of work: one dispatched job, one merge step, one CSS read.
#[derive(Debug, Clone)]
pub struct Span {
    /// The span's name, e.g. `"dispatch.job"`.
    pub name: String,
    /// The context this span belongs to.
    pub ctx: SpanContext,
    /// When the span started.
    pub start: DateTime<Utc>,
    /// When the span ended, if it has.
    pub end: Option<DateTime<Utc>>,
    /// Events recorded against the span while it was open.
    pub events: Vec<SpanEvent>,
}

impl Span {
    /// Record an event against this still-open span.
    pub fn event(&mut self, msg: impl Into<String>) {
        self.events.push(SpanEvent {
            msg: msg.into(),
            time: Utc::now(),
        });
    }

    /// End the span and, if a collector is attached, export it.
    pub fn end(mut self) {
        self.end = Some(Utc::now());
        if let Some(collector) = self.ctx.collector.clone() {
            collector.export(self);
        }
    }
}

/// Guards a [`Span`], ending it (and exporting it) on drop — used so a job's
/// span always closes even if the owning future is cancelled.
#[derive(Debug)]
pub struct SpanRecorder {
    span: Mutex<Option<Span>>,
}

impl SpanRecorder {
    /// Start recording a new child span of `ctx`.
    pub fn new(ctx: Option<&SpanContext>, name: impl Into<String>) -> Self {
        let span = ctx.map(|c| c.child(name));
        Self {
            span: Mutex::new(span),
        }
    }

    /// Record an event against the span, if one is being recorded.
    pub fn event(&self, msg: impl Into<String>) {
        if let Some(span) = self.span.lock().as_mut() {
            span.event(msg);
        }
    }
}

impl Drop for SpanRecorder {
    fn drop(&mut self) {
        if let Some(span) = self.span.lock().take() {
            span.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Default)]
    struct CollectInto(StdMutex<Vec<Span>>);

    impl TraceCollector for CollectInto {
        fn export(&self, span: Span) {
            self.0.lock().unwrap().push(span);
        }
    }

    #[test]
    fn child_spans_share_trace_id() {
        let collector = Arc::new(CollectInto::default());
        let ctx = SpanContext::new(Some(collector.clone() as Arc<dyn TraceCollector>));
        let a = ctx.child("job.a");
        let b = ctx.child("job.b");
        assert_eq!(a.ctx.trace_id, ctx.trace_id);
        assert_eq!(b.ctx.trace_id, ctx.trace_id);
        assert_ne!(a.ctx.parent_span_id, b.ctx.parent_span_id);
        a.end();
        b.end();
        assert_eq!(collector.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn recorder_exports_on_drop() {
        let collector = Arc::new(CollectInto::default());
        let ctx = SpanContext::new(Some(collector.clone() as Arc<dyn TraceCollector>));
        {
            let recorder = SpanRecorder::new(Some(&ctx), "merge.finalize");
            recorder.event("header parsed");
        }
        let spans = collector.0.lock().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].events.len(), 1);
    }
}
