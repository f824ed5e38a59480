//! Worker-side chunk scanning: admission scheduling across two alternative
//! disciplines ([`scan_scheduler::ChunkDisk`] and
//! [`group_scheduler::GroupScheduler`]) and per-task fragment execution
//! ([`executor::TaskExecutor`]) with row packing into the wire format
//! ([`row_packer::RowPacker`]).
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod config;
mod executor;
mod group_scheduler;
mod row_packer;
mod scan_scheduler;
mod scheduler;
mod task;

pub use executor::TaskExecutor;
pub use group_scheduler::GroupScheduler;
pub use row_packer::{ColumnChunk, PackedOutput, Row, RowPacker, WorkerError};
pub use scan_scheduler::ChunkDisk;
pub use scheduler::WorkerScheduler;
pub use task::Task;
