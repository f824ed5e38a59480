//! Observability ecosystem dependencies for the Qserv-style query engine, to
//! ensure consistent versions and unified updates across every crate in the
//! workspace.
//!
//! Every crate that wants to log should do so through
//! `observability_deps::tracing` rather than depending on `tracing`
//! directly, so that the version used throughout the workspace stays in
//! lock-step.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub use tracing;
