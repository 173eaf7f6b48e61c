//! Conversion rules: lower each logical operator to its physical form once
//! every input is physical. Lowering a partitioned scan is where data
//! movement first becomes explicit, as a union exchange over the fragment
//! scan.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::plan::{NodeKind, RelNode};

lazy_static! {
    static ref SCAN_PATTERN: Pattern =
        Pattern::leaf(|p| p.is_logical() && matches!(p.kind(), NodeKind::TableScan(_)));
    static ref CALC_PATTERN: Pattern = Pattern::on_child(
        |p| p.is_logical() && matches!(p.kind(), NodeKind::Calc(_)),
        |p| p.is_physical(),
    );
    static ref AGG_PATTERN: Pattern = Pattern::on_child(
        |p| p.is_logical() && matches!(p.kind(), NodeKind::HashAggregate(_)),
        |p| p.is_physical(),
    );
    static ref SORT_PATTERN: Pattern = Pattern::on_child(
        |p| p.is_logical() && matches!(p.kind(), NodeKind::Sort(_)),
        |p| p.is_physical(),
    );
    static ref LIMIT_PATTERN: Pattern = Pattern::on_child(
        |p| p.is_logical() && matches!(p.kind(), NodeKind::Limit(_)),
        |p| p.is_physical(),
    );
}

fn shape_bug(rule: &str) -> PlannerError {
    PlannerError::Internal(format!("{} bound an unexpected plan shape", rule))
}

/// LogicalTableScan -> PhysicalTableScan, wrapped in a union exchange when
/// the table is partitioned so the rows can reach the coordinator side.
#[derive(Clone, Debug, Default)]
pub struct ScanConvertRule;

impl Rule for ScanConvertRule {
    fn pattern(&self) -> &Pattern {
        &SCAN_PATTERN
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let plan = opt_expr.root.plan();
        let payload = plan.as_table_scan().ok_or_else(|| shape_bug("ScanConvert"))?;

        let scan = RelNode::physical_scan(payload.table.clone());
        let new_plan = if scan.distribution().is_singleton() {
            scan
        } else {
            RelNode::union_exchange(scan, 0)
        };
        result.push(OptExpr::from_plan(&new_plan));
        Ok(())
    }
}

/// LogicalCalc -> PhysicalCalc.
#[derive(Clone, Debug, Default)]
pub struct CalcConvertRule;

impl Rule for CalcConvertRule {
    fn pattern(&self) -> &Pattern {
        &CALC_PATTERN
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let plan = opt_expr.root.plan();
        let program = plan.as_calc().cloned().ok_or_else(|| shape_bug("CalcConvert"))?;
        let input = opt_expr.children[0].root.plan().clone();

        let new_plan = RelNode::physical_calc(program, input);
        result.push(OptExpr::new(OptExprNode::Plan(new_plan), opt_expr.children));
        Ok(())
    }
}

/// LogicalAggregate -> PhysicalHashAggregate at the single stage. Turning a
/// single-stage aggregate into a distributed plan is the transpose rules'
/// business, not lowering's.
#[derive(Clone, Debug, Default)]
pub struct AggConvertRule;

impl Rule for AggConvertRule {
    fn pattern(&self) -> &Pattern {
        &AGG_PATTERN
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let plan = opt_expr.root.plan();
        let payload = plan.as_aggregate().cloned().ok_or_else(|| shape_bug("AggConvert"))?;
        let input = opt_expr.children[0].root.plan().clone();

        let new_plan = RelNode::hash_aggregate(payload.group_by, payload.calls, payload.stage, input);
        result.push(OptExpr::new(OptExprNode::Plan(new_plan), opt_expr.children));
        Ok(())
    }
}

/// LogicalSort -> PhysicalSort.
#[derive(Clone, Debug, Default)]
pub struct SortConvertRule;

impl Rule for SortConvertRule {
    fn pattern(&self) -> &Pattern {
        &SORT_PATTERN
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let plan = opt_expr.root.plan();
        let payload = plan.as_sort().cloned().ok_or_else(|| shape_bug("SortConvert"))?;
        let input = opt_expr.children[0].root.plan().clone();

        let new_plan = RelNode::physical_sort(payload, input);
        result.push(OptExpr::new(OptExprNode::Plan(new_plan), opt_expr.children));
        Ok(())
    }
}

/// LogicalLimit -> PhysicalLimit.
#[derive(Clone, Debug, Default)]
pub struct LimitConvertRule;

impl Rule for LimitConvertRule {
    fn pattern(&self) -> &Pattern {
        &LIMIT_PATTERN
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let plan = opt_expr.root.plan();
        let payload = plan.as_limit().cloned().ok_or_else(|| shape_bug("LimitConvert"))?;
        let input = opt_expr.children[0].root.plan().clone();

        let new_plan = RelNode::physical_limit(payload.limit, payload.offset, input);
        result.push(OptExpr::new(OptExprNode::Plan(new_plan), opt_expr.children));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::optimizer::test_util::*;
    use crate::plan::Distribution;

    #[test]
    fn test_replicated_scan_lowers_without_exchange() {
        let scan = RelNode::logical_scan(replicated_table());
        let mut result = Substitute::default();
        ScanConvertRule
            .apply(OptExpr::from_plan(&scan), &mut result)
            .unwrap();

        let plan = result.opt_exprs[0].to_plan();
        assert!(matches!(plan.kind(), NodeKind::TableScan(_)));
        assert!(plan.is_physical());
        assert_eq!(*plan.distribution(), Distribution::Singleton);
    }

    #[test]
    fn test_partitioned_scan_lowers_under_union_exchange() {
        let scan = RelNode::logical_scan(partitioned_table());
        let mut result = Substitute::default();
        ScanConvertRule
            .apply(OptExpr::from_plan(&scan), &mut result)
            .unwrap();

        let plan = result.opt_exprs[0].to_plan();
        assert!(matches!(plan.kind(), NodeKind::UnionExchange(_)));
        let fragment = plan.input(0);
        assert!(matches!(fragment.kind(), NodeKind::TableScan(_)));
        assert_eq!(*fragment.distribution(), Distribution::Hash(vec![0]));
        assert_eq!(fragment.split_count(), 4);
    }
}
