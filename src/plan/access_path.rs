use std::fmt;

use itertools::Itertools;

use super::{Collation, CollationField, Direction};
use crate::catalog::IndexCatalog;
use crate::expr::ScalarExpr;

/// How an index is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLookup {
    /// Walk the whole index; useful for its order alone.
    Full,
    /// Equality on the first `columns` key columns.
    Equality { columns: usize },
    /// Equality on `eq_prefix` key columns, then one range conjunct on the
    /// next one. `lower`/`upper` flag which bound the range supplies.
    Range {
        eq_prefix: usize,
        lower: bool,
        upper: bool,
    },
}

/// The resolved strategy for reading rows through an index: lookup type,
/// fixed scan direction, and the residual predicate the index cannot cover.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPath {
    pub index: IndexCatalog,
    pub lookup: IndexLookup,
    pub direction: Direction,
    /// Conjuncts not covered by the index; evaluated on top of the scan.
    pub residual: Vec<ScalarExpr>,
    /// Result order already satisfies the requested collation.
    pub order_matches: bool,
}

impl AccessPath {
    /// Number of leading key columns the lookup consumes. The candidate
    /// consuming the most wins index selection.
    pub fn consumed_columns(&self) -> usize {
        match self.lookup {
            IndexLookup::Full => 0,
            IndexLookup::Equality { columns } => columns,
            IndexLookup::Range { eq_prefix, .. } => eq_prefix + 1,
        }
    }

    /// The ordering the scan emits: index key columns in the resolved
    /// direction, expressed against the table's row type.
    pub fn provided_collation(&self) -> Collation {
        Collation::new(
            self.index
                .key_columns
                .iter()
                .map(|&ordinal| CollationField {
                    ordinal,
                    direction: self.direction,
                })
                .collect(),
        )
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {:?} {}", self.index.name, self.lookup, self.direction)?;
        if !self.residual.is_empty() {
            write!(f, ", residual [{}]", self.residual.iter().join(" AND "))?;
        }
        Ok(())
    }
}
