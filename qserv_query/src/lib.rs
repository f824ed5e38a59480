//! The parsed-query representation (C4 surface the embedded SQL parser
//! hands off to), analysis/validation passes, and the per-chunk rewriter
//! that turns one user query into worker fragments plus a coordinator merge
//! query.
//!
//! [`ast`] is the tagged-variant statement shape described in spec §9 (no
//! visitor dispatch); [`analyzer::analyze`] resolves column references,
//! classifies FROM-list tables and extracts spatial restrictors;
//! [`table_ref_checker::check_table_refs`] validates every table exists in
//! the catalog; [`rewriter::rewrite`] produces the [`rewriter::RewritePlan`].
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod analyzer;
pub mod ast;
pub mod column_vertex_map;
pub mod error;
pub mod rewriter;
pub mod table_ref_checker;

pub use analyzer::{analyze, AnalyzedQuery, TableSchema};
pub use ast::{
    AggFunc, BoolTerm, ColumnRef, CompareOp, JoinKind, OrderBy, SelectStmt, SpatialRestrictor,
    TableRef, ValueExpr,
};
pub use column_vertex_map::ColumnVertexMap;
pub use error::QueryError;
pub use rewriter::{rewrite, MergeStep, RewriteError, RewritePlan};
pub use table_ref_checker::{check_table_refs, TableRefError};
