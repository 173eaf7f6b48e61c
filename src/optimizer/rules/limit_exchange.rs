//! Push a row-count cap into the fragments so each site ships at most
//! limit + offset rows to the coordinator.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::plan::{NodeKind, RelNode};

lazy_static! {
    static ref LIMIT_OVER_UNION: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Limit(_)),
        |p| matches!(p.kind(), NodeKind::UnionExchange(_)),
    );
}

/// PhysicalLimit over UnionExchange -> the same coordinator limit over a
/// fragment limit of `limit + offset` rows (offset zero; a fragment cannot
/// know which rows the coordinator will skip). The coordinator node stays
/// because fragments only bound, never finalize, the row count.
///
/// Offset-only limits push nothing. The rule is idempotent: once the
/// fragment cap is in place it refuses.
#[derive(Clone, Debug, Default)]
pub struct LimitExchangeTransposeRule;

impl Rule for LimitExchangeTransposeRule {
    fn pattern(&self) -> &Pattern {
        &LIMIT_OVER_UNION
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let payload = opt_expr
            .root
            .plan()
            .as_limit()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("LimitExchangeTranspose root is not a limit".into()))?;
        let Some(limit) = payload.limit else {
            return Ok(());
        };
        let exchange_plan = opt_expr.children[0].root.plan().clone();
        let level = exchange_plan
            .as_exchange()
            .map(|p| p.level)
            .ok_or_else(|| PlannerError::Internal("LimitExchangeTranspose child is not an exchange".into()))?;
        let fragment = exchange_plan.input(0);

        let fragment_cap = limit + payload.offset.unwrap_or(0);
        if let Some(existing) = fragment.as_limit() {
            if existing.limit == Some(fragment_cap) && existing.offset.unwrap_or(0) == 0 {
                return Ok(());
            }
        }

        let fragment_limit = RelNode::physical_limit(Some(fragment_cap), None, fragment);
        let union = RelNode::union_exchange(fragment_limit.clone(), level);
        let coordinator = RelNode::physical_limit(payload.limit, payload.offset, union.clone());
        result.push(OptExpr::new(
            OptExprNode::Plan(coordinator),
            vec![OptExpr::new(
                OptExprNode::Plan(union),
                vec![OptExpr::new(
                    OptExprNode::Plan(fragment_limit),
                    opt_expr.children[0].children.clone(),
                )],
            )],
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::optimizer::test_util::*;
    use crate::plan::{LimitPayload, RelRef};

    fn limit_over_union(limit: Option<u64>, offset: Option<u64>) -> RelRef {
        let scan = RelNode::physical_scan(partitioned_table());
        let union = RelNode::union_exchange(scan, 0);
        RelNode::physical_limit(limit, offset, union)
    }

    fn apply(plan: &RelRef) -> Option<RelRef> {
        let mut result = Substitute::default();
        LimitExchangeTransposeRule
            .apply(OptExpr::from_plan(plan), &mut result)
            .unwrap();
        result.opt_exprs.first().map(|e| e.to_plan())
    }

    #[test]
    fn test_fragment_cap_is_limit_plus_offset() {
        // LIMIT 10 OFFSET 5: rows 6..=15 of the gathered order
        let new_plan = apply(&limit_over_union(Some(10), Some(5))).unwrap();

        let coordinator = new_plan.as_limit().unwrap();
        assert_eq!((coordinator.limit, coordinator.offset), (Some(10), Some(5)));

        let fragment_limit = new_plan.input(0).input(0);
        let payload = fragment_limit.as_limit().unwrap();
        assert_eq!((payload.limit, payload.offset), (Some(15), None));
        assert_eq!(fragment_limit.split_count(), 4);
    }

    /// Reference evaluation of one limit stage over an ordered row stream.
    fn run_limit(payload: &LimitPayload, rows: &[i64]) -> Vec<i64> {
        let skip = payload.offset.unwrap_or(0) as usize;
        let take = payload.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        rows.iter().skip(skip).take(take).copied().collect()
    }

    #[test]
    fn test_two_stage_limit_returns_exact_ranks() {
        let new_plan = apply(&limit_over_union(Some(10), Some(5))).unwrap();
        let coordinator = new_plan.as_limit().unwrap().clone();
        let fragment = new_plan.input(0).input(0);
        let fragment_cap = fragment.as_limit().unwrap().clone();

        // rows 1..=100 dealt round-robin across the 4 sites, each site
        // holding its share in the query's order
        let fragments: Vec<Vec<i64>> = (0..4i64)
            .map(|site| (1..=100).filter(|v| v % 4 == site).collect())
            .collect();

        let mut gathered: Vec<i64> = fragments
            .iter()
            .flat_map(|rows| run_limit(&fragment_cap, rows))
            .collect();
        // the interleaved gather loses order; the coordinator re-establishes it
        gathered.sort_unstable();

        assert_eq!(
            run_limit(&coordinator, &gathered),
            (6..=15).collect::<Vec<i64>>()
        );
        // no fragment sheds a row the coordinator might still need
        for rows in &fragments {
            assert_eq!(run_limit(&fragment_cap, rows).len(), 15);
        }
    }

    #[test]
    fn test_offset_only_refuses() {
        assert!(apply(&limit_over_union(None, Some(5))).is_none());
    }

    #[test]
    fn test_pushed_plan_refuses_again() {
        let pushed = apply(&limit_over_union(Some(10), Some(5))).unwrap();
        assert!(apply(&pushed).is_none());
    }
}
