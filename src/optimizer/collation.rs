//! Collation reasoning: whether an index's natural order can stand in for a
//! requested sort, and how a requirement moves backward through a Calc.

use crate::expr::Program;
use crate::plan::{Collation, CollationField, Direction};

/// Translate a required collation backward through a Calc's expression
/// mapping. Succeeds only when the mapping is exact and total: every
/// requested field must be a plain column reference in the program.
pub fn translate_through_program(required: &Collation, program: &Program) -> Option<Collation> {
    required
        .fields
        .iter()
        .map(|cf| {
            program.source_column(cf.ordinal).map(|ordinal| CollationField {
                ordinal,
                direction: cf.direction,
            })
        })
        .collect::<Option<Vec<_>>>()
        .map(Collation::new)
}

/// Does an index whose key columns are `key_columns` (in key order) emit
/// rows in the requested order, scanning one way or the other?
///
/// The request must be a prefix of the key columns with one uniform
/// direction: all-ascending resolves to a forward scan, all-descending to a
/// reverse scan. Mixed-direction requests are INVALID and are never
/// silently reordered.
pub fn index_satisfies_collation(
    key_columns: &[usize],
    required: &Collation,
) -> Option<Direction> {
    if required.is_empty() || required.fields.len() > key_columns.len() {
        return None;
    }
    let direction = required.fields[0].direction;
    if required.fields.iter().any(|f| f.direction != direction) {
        return None;
    }
    let prefix_matches = key_columns
        .iter()
        .zip(required.fields.iter())
        .all(|(key, want)| *key == want.ordinal);
    prefix_matches.then_some(direction)
}
