//! Wire message shapes, frame packing, result-row escaping, and resource
//! path naming shared between the dispatch layer and the worker task
//! executor.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod escape;
mod message;
mod resource;

pub use escape::{escape_field, unescape_field, NULL_TOKEN};
pub use message::{
    verify_payload, wrap_header, unwrap_header, Fragment, FrameError, ProtoHeader, ResultMsg,
    RowBundle, RowSchema, TaskMsg, PROTOBUFFER_DESIRED_LIMIT, PROTOBUFFER_HARD_LIMIT,
    PROTO_HEADER_SIZE,
};
pub use resource::{ResourceUnit, UnitType};
