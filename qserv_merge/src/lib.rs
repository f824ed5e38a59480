//! Streams worker results into a destination table as they arrive and runs
//! the coordinator-side query that folds per-chunk partial aggregates into
//! a query's final result.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod merger;
mod state;

pub use merger::{InfileMerger, MergeError, MergeSink};
pub use state::MergeState;
