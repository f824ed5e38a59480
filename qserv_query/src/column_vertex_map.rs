//! Resolves unqualified column references to the table reference(s) they
//! can originate from.
//!
//! Grounded on `ColumnVertexMap`: most columns map to exactly one table,
//! but two cases produce more than one owner — an ambiguous reference
//! (an error once the query is used) and a natural/`USING` join column,
//! which maps to every table contributing it. `splice` merges the vertex
//! sets for the columns named in a `USING`/`NATURAL JOIN` clause instead
//! of rebuilding the whole map.

use std::collections::BTreeMap;

use crate::ast::TableRef;

/// Maps an unqualified column name to the table reference(s) it could come
/// from.
#[derive(Debug, Clone, Default)]
pub struct ColumnVertexMap {
    entries: BTreeMap<String, Vec<TableRef>>,
}

impl ColumnVertexMap {
    /// An empty map.
    pub fn new() -> ColumnVertexMap {
        ColumnVertexMap::default()
    }

    /// Register that `table` contributes `column`.
    pub fn insert(&mut self, column: impl Into<String>, table: TableRef) {
        self.entries.entry(column.into()).or_default().push(table);
    }

    /// The table(s) `column` could originate from. Empty if unrecognized,
    /// more than one if ambiguous or naturally joined.
    pub fn find(&self, column: &str) -> &[TableRef] {
        self.entries.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `column` unambiguously resolves to a single table.
    pub fn is_unambiguous(&self, column: &str) -> bool {
        self.find(column).len() == 1
    }

    /// The unqualified column names both maps have an entry for — the
    /// candidate set for `NATURAL JOIN`.
    pub fn common_columns(&self, other: &ColumnVertexMap) -> Vec<String> {
        self.entries
            .keys()
            .filter(|c| other.entries.contains_key(*c))
            .cloned()
            .collect()
    }

    /// Concatenate `other`'s table refs into `self` for every column that
    /// should be treated as shared rather than ambiguous: every column in
    /// `using_columns`, plus (when `natural` is set) every column common to
    /// both maps. A name not named here that exists on both sides remains
    /// ambiguous, per the plain cross-join default.
    pub fn splice(&mut self, other: &ColumnVertexMap, natural: bool, using_columns: &[String]) {
        let mut shared: Vec<String> = using_columns.to_vec();
        if natural {
            shared.extend(self.common_columns(other));
        }
        shared.sort();
        shared.dedup();

        for col in shared {
            let incoming = other.entries.get(&col).cloned().unwrap_or_default();
            let vertices = self.entries.entry(col).or_default();
            for v in incoming {
                if !vertices.iter().any(|e| e.db == v.db && e.table == v.table && e.alias == v.alias) {
                    vertices.push(v);
                }
            }
        }
    }
}
