//! Shared [`clap`] option blocks used by the `qserv` binary's subcommands.
//!
//! Mirrors the teacher's pattern of one `#[derive(clap::Parser)]` struct per
//! concern, flattened into whichever subcommand needs it, with every field
//! bindable from the environment via `#[clap(env = "...")]` so the worker
//! can be driven by either CLI flags or the INI-style keys from spec §6.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod memman;
pub mod worker;

pub use memman::{MemManConfig, MemManKind};
pub use worker::WorkerConfig;
