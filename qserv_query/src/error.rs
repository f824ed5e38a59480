//! The query-analyzer/rewriter error taxonomy: parse failure, ambiguous
//! column, unknown database/table, unsupported construct. Terminal for the
//! query it belongs to (other queries in flight are unaffected).

use snafu::prelude::*;

use crate::table_ref_checker::TableRefError;

/// Errors raised analyzing a query.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum QueryError {
    /// The query text could not be parsed.
    #[snafu(display("failed to parse query: {detail}"))]
    ParseFailure { detail: String },

    /// An unqualified column name could be resolved to more than one
    /// table and isn't covered by a `NATURAL JOIN`/`USING` clause.
    #[snafu(display("ambiguous column reference: {column}"))]
    AmbiguousColumn { column: String },

    /// The referenced database is not registered in the catalog.
    #[snafu(display("unknown database: {db}"))]
    UnknownDb { db: String },

    /// The referenced table is not registered under its database.
    #[snafu(display("unknown table: {db}.{table}"))]
    UnknownTable { db: String, table: String },

    /// A construct the analyzer recognizes but does not support.
    #[snafu(display("unsupported construct: {detail}"))]
    UnsupportedConstruct { detail: String },
}

impl From<TableRefError> for QueryError {
    fn from(e: TableRefError) -> QueryError {
        match e {
            TableRefError::UnknownDb { db } => QueryError::UnknownDb { db },
            TableRefError::UnknownTable { db, table } => QueryError::UnknownTable { db, table },
        }
    }
}
