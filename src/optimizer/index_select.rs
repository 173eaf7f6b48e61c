//! Access-path selection: match a table's predicate conjuncts and sort
//! requirement against each index and pick the best candidate.

use crate::catalog::IndexCatalog;
use crate::expr::{BinaryOperator, ScalarExpr};
use crate::optimizer::collation::index_satisfies_collation;
use crate::plan::{AccessPath, Collation, Direction, IndexLookup};

/// Build the access path this index supports for the given conjuncts, or
/// `None` when the index helps with neither filtering nor ordering.
///
/// Key columns are consumed left to right: one equality conjunct per column,
/// then optionally one more column via range conjuncts (a lower and an upper
/// bound on that column may both be taken). Everything not consumed lands in
/// the residual, in the conjuncts' original order.
///
/// Partial indexes never match a sort requirement alone; their filtered row
/// set makes order-only use unsound without predicate implication checks.
pub fn relevant_access_path(
    index: &IndexCatalog,
    conjuncts: &[ScalarExpr],
    wanted: Option<&Collation>,
) -> Option<AccessPath> {
    let mut consumed = vec![false; conjuncts.len()];
    let mut eq_prefix = 0usize;
    let mut range = None;

    'keys: for &key in &index.key_columns {
        // one equality on this key column extends the prefix
        for (i, conjunct) in conjuncts.iter().enumerate() {
            if consumed[i] {
                continue;
            }
            if conjunct.as_column_comparison() == Some((key, BinaryOperator::Eq)) {
                consumed[i] = true;
                eq_prefix += 1;
                continue 'keys;
            }
        }
        // no equality: the next key column may still take range bounds
        let mut lower = false;
        let mut upper = false;
        for (i, conjunct) in conjuncts.iter().enumerate() {
            if consumed[i] {
                continue;
            }
            match conjunct.as_column_comparison() {
                Some((col, op)) if col == key && op.is_range_comparison() => {
                    let take = match op {
                        BinaryOperator::Gt | BinaryOperator::GtEq if !lower => {
                            lower = true;
                            true
                        }
                        BinaryOperator::Lt | BinaryOperator::LtEq if !upper => {
                            upper = true;
                            true
                        }
                        _ => false,
                    };
                    if take {
                        consumed[i] = true;
                    }
                }
                _ => {}
            }
        }
        if lower || upper {
            range = Some((eq_prefix, lower, upper));
        }
        break;
    }

    let lookup = match range {
        Some((eq_prefix, lower, upper)) => IndexLookup::Range {
            eq_prefix,
            lower,
            upper,
        },
        None if eq_prefix > 0 => IndexLookup::Equality { columns: eq_prefix },
        None => IndexLookup::Full,
    };

    let mut direction = Direction::Ascending;
    let mut order_matches = false;
    if let Some(wanted) = wanted {
        if !index.is_partial() {
            if let Some(dir) = index_satisfies_collation(&index.key_columns, wanted) {
                direction = dir;
                order_matches = true;
            }
        }
    }

    if lookup == IndexLookup::Full && !order_matches {
        return None;
    }

    let residual = conjuncts
        .iter()
        .zip(consumed.iter())
        .filter(|(_, used)| !**used)
        .map(|(c, _)| c.clone())
        .collect();

    Some(AccessPath {
        index: index.clone(),
        lookup,
        direction,
        residual,
        order_matches,
    })
}

/// Pick the winning access path across all of a table's indexes.
///
/// Candidates are ranked by consumed leading key columns, ties broken in
/// favor of one whose order matches the requirement. Among fully tied
/// candidates the first index in catalog order wins, so selection is
/// deterministic for a fixed catalog.
pub fn choose_access_path(
    indexes: &[IndexCatalog],
    conjuncts: &[ScalarExpr],
    wanted: Option<&Collation>,
) -> Option<AccessPath> {
    let mut best: Option<AccessPath> = None;
    for index in indexes {
        let Some(candidate) = relevant_access_path(index, conjuncts, wanted) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some(current) => {
                (candidate.consumed_columns(), candidate.order_matches)
                    > (current.consumed_columns(), current.order_matches)
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::plan::CollationField;

    fn cmp(col: usize, op: BinaryOperator, v: i64) -> ScalarExpr {
        ScalarExpr::binary(op, ScalarExpr::input_ref(col), ScalarExpr::constant(v))
    }

    #[test]
    fn test_equality_prefix_then_one_range_then_residual() {
        // index on (a, b, c) = columns (0, 1, 2); a = 5 AND b > 3 AND d = 1
        let index = IndexCatalog::new("idx_abc", vec![0, 1, 2]);
        let conjuncts = vec![
            cmp(0, BinaryOperator::Eq, 5),
            cmp(1, BinaryOperator::Gt, 3),
            cmp(3, BinaryOperator::Eq, 1),
        ];

        let path = relevant_access_path(&index, &conjuncts, None).unwrap();
        assert_eq!(
            path.lookup,
            IndexLookup::Range {
                eq_prefix: 1,
                lower: true,
                upper: false
            }
        );
        assert_eq!(path.consumed_columns(), 2);
        assert_eq!(path.residual, vec![cmp(3, BinaryOperator::Eq, 1)]);
    }

    #[test]
    fn test_range_takes_both_bounds_on_one_column() {
        let index = IndexCatalog::new("idx_a", vec![0]);
        let conjuncts = vec![
            cmp(0, BinaryOperator::GtEq, 3),
            cmp(0, BinaryOperator::Lt, 9),
        ];

        let path = relevant_access_path(&index, &conjuncts, None).unwrap();
        assert_eq!(
            path.lookup,
            IndexLookup::Range {
                eq_prefix: 0,
                lower: true,
                upper: true
            }
        );
        assert!(path.residual.is_empty());
    }

    #[test]
    fn test_gap_in_key_columns_stops_consumption() {
        // index (a, b, c); a = 5 AND c = 7: c cannot be used without b
        let index = IndexCatalog::new("idx_abc", vec![0, 1, 2]);
        let conjuncts = vec![cmp(0, BinaryOperator::Eq, 5), cmp(2, BinaryOperator::Eq, 7)];

        let path = relevant_access_path(&index, &conjuncts, None).unwrap();
        assert_eq!(path.lookup, IndexLookup::Equality { columns: 1 });
        assert_eq!(path.residual, vec![cmp(2, BinaryOperator::Eq, 7)]);
    }

    #[test]
    fn test_useless_index_yields_no_path() {
        let index = IndexCatalog::new("idx_b", vec![1]);
        let conjuncts = vec![cmp(0, BinaryOperator::Eq, 5)];
        assert_eq!(relevant_access_path(&index, &conjuncts, None), None);
    }

    #[test]
    fn test_order_only_full_scan() {
        let index = IndexCatalog::new("idx_a", vec![0, 1]);
        let wanted = Collation::new(vec![CollationField::desc(0)]);

        let path = relevant_access_path(&index, &[], Some(&wanted)).unwrap();
        assert_eq!(path.lookup, IndexLookup::Full);
        assert_eq!(path.direction, Direction::Descending);
        assert!(path.order_matches);
    }

    #[test]
    fn test_partial_index_never_matches_order_alone() {
        let index = IndexCatalog::new("idx_part", vec![0])
            .partial(cmp(1, BinaryOperator::Gt, 0));
        let wanted = Collation::ascending_on([0]);

        assert_eq!(relevant_access_path(&index, &[], Some(&wanted)), None);

        // it still serves equality lookups
        let conjuncts = vec![cmp(0, BinaryOperator::Eq, 5)];
        let path = relevant_access_path(&index, &conjuncts, Some(&wanted)).unwrap();
        assert_eq!(path.lookup, IndexLookup::Equality { columns: 1 });
        assert!(!path.order_matches);
    }

    #[test]
    fn test_choose_prefers_longer_prefix_then_order() {
        let idx_a = IndexCatalog::new("idx_a", vec![0]);
        let idx_ab = IndexCatalog::new("idx_ab", vec![0, 1]);
        let conjuncts = vec![cmp(0, BinaryOperator::Eq, 5), cmp(1, BinaryOperator::Eq, 3)];

        let best = choose_access_path(&[idx_a.clone(), idx_ab.clone()], &conjuncts, None).unwrap();
        assert_eq!(best.index.name, "idx_ab");

        // equal prefixes: the order-matching candidate wins
        let idx_ba = IndexCatalog::new("idx_ba", vec![1, 0]);
        // explicit field order: ascending_on would sort the ordinals
        let wanted = Collation::new(vec![CollationField::asc(1), CollationField::asc(0)]);
        let best =
            choose_access_path(&[idx_ab, idx_ba], &conjuncts, Some(&wanted)).unwrap();
        assert_eq!(best.index.name, "idx_ba");
    }

    #[test]
    fn test_choose_is_deterministic_on_full_ties() {
        let first = IndexCatalog::new("idx_first", vec![0]);
        let second = IndexCatalog::new("idx_second", vec![0]);
        let conjuncts = vec![cmp(0, BinaryOperator::Eq, 5)];

        for _ in 0..8 {
            let best = choose_access_path(
                &[first.clone(), second.clone()],
                &conjuncts,
                None,
            )
            .unwrap();
            assert_eq!(best.index.name, "idx_first");
        }
    }
}
