//! Trade a coordinator sort of the gathered result for per-fragment sorts
//! under an order-preserving merge.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::plan::{NodeKind, RelNode};

lazy_static! {
    static ref SORT_OVER_UNION: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Sort(_)),
        |p| matches!(p.kind(), NodeKind::UnionExchange(_)),
    );
}

/// PhysicalSort over UnionExchange. Registers two equivalent plans and lets
/// the cost model choose: the coordinator sort as matched, or each fragment
/// sorted locally with a MergeExchange keeping the order across the gather.
///
/// A sort carrying fetch/offset is not equivalent to its fragment-local
/// version, so only unlimited sorts participate.
#[derive(Clone, Debug, Default)]
pub struct SortExchangeTransposeRule;

impl Rule for SortExchangeTransposeRule {
    fn pattern(&self) -> &Pattern {
        &SORT_OVER_UNION
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let sort = opt_expr
            .root
            .plan()
            .as_sort()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("SortExchangeTranspose root is not a sort".into()))?;
        if !sort.is_unlimited() {
            return Ok(());
        }
        let exchange_plan = opt_expr.children[0].root.plan().clone();
        let level = exchange_plan
            .as_exchange()
            .map(|p| p.level)
            .ok_or_else(|| PlannerError::Internal("SortExchangeTranspose child is not an exchange".into()))?;
        let fragment = exchange_plan.input(0);

        // alternative 1: sort the whole result on the coordinator
        result.push(opt_expr.clone());

        // alternative 2: fragment sorts under a merge gather
        let fragment_sort = RelNode::physical_sort(sort, fragment);
        let merge = RelNode::merge_exchange(fragment_sort.clone(), level);
        result.push(OptExpr::new(
            OptExprNode::Plan(merge),
            vec![OptExpr::new(
                OptExprNode::Plan(fragment_sort),
                opt_expr.children[0].children.clone(),
            )],
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::optimizer::core::OptExprNode;
    use crate::optimizer::cost::{CostModel, OperatorCountCost};
    use crate::plan::{Collation, SortPayload};

    fn sort_over_union(fetch: Option<u64>) -> crate::plan::RelRef {
        let scan = RelNode::physical_scan(crate::optimizer::test_util::partitioned_table());
        let union = RelNode::union_exchange(scan, 0);
        RelNode::physical_sort(
            SortPayload {
                collation: Collation::ascending_on([1]),
                fetch,
                offset: None,
            },
            union,
        )
    }

    #[test]
    fn test_registers_both_alternatives_and_merge_is_cheaper() {
        let plan = sort_over_union(None);
        let mut result = Substitute::default();
        SortExchangeTransposeRule
            .apply(OptExpr::from_plan(&plan), &mut result)
            .unwrap();
        assert_eq!(result.opt_exprs.len(), 2);

        let merge_alt = result.opt_exprs[1].root.plan().clone();
        assert!(matches!(merge_alt.kind(), NodeKind::MergeExchange(_)));
        // the merge preserves the fragment sort's order
        assert_eq!(*merge_alt.collation(), Collation::ascending_on([1]));
        let fragment_sort = merge_alt.input(0);
        assert_eq!(fragment_sort.split_count(), 4);

        let coordinator_alt = match &result.opt_exprs[0].root {
            OptExprNode::Plan(p) => p.clone(),
            _ => unreachable!(),
        };
        let cost = OperatorCountCost;
        assert!(cost.plan_cost(&merge_alt) < cost.plan_cost(&coordinator_alt));
    }

    #[test]
    fn test_limited_sort_does_not_transpose() {
        let plan = sort_over_union(Some(10));
        let mut result = Substitute::default();
        SortExchangeTransposeRule
            .apply(OptExpr::from_plan(&plan), &mut result)
            .unwrap();
        assert!(result.opt_exprs.is_empty());
    }
}
