//! Validates that every table referenced by a query is registered in the
//! central state store before the query is rewritten.
//!
//! Grounded on `TableRefChecker`: a small pass run ahead of rewrite that
//! rejects a query referencing a database or table CSS doesn't know about,
//! rather than letting the rewriter fail confusingly partway through.

use snafu::prelude::*;

use crate::ast::TableRef;
use qserv_css::Facade;

/// Errors raised by [`check_table_refs`].
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum TableRefError {
    /// The referenced database is not registered.
    #[snafu(display("unknown database: {db}"))]
    UnknownDb { db: String },

    /// The referenced table is not registered under its database.
    #[snafu(display("unknown table: {db}.{table}"))]
    UnknownTable { db: String, table: String },
}

/// Check every table reference in `refs` against `css`, returning the
/// first problem found.
pub fn check_table_refs(css: &Facade<'_>, refs: &[TableRef]) -> Result<(), TableRefError> {
    for r in refs {
        match css.contains_db(&r.db) {
            Ok(true) => {}
            Ok(false) => return UnknownDbSnafu { db: r.db.clone() }.fail(),
            Err(_) => return UnknownDbSnafu { db: r.db.clone() }.fail(),
        }
        match css.contains_table(&r.db, &r.table) {
            Ok(true) => {}
            Ok(false) => {
                return UnknownTableSnafu {
                    db: r.db.clone(),
                    table: r.table.clone(),
                }
                .fail()
            }
            Err(_) => {
                return UnknownTableSnafu {
                    db: r.db.clone(),
                    table: r.table.clone(),
                }
                .fail()
            }
        }
    }
    Ok(())
}
