//! Collapse stacked Calc nodes into one program.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::expr::Program;
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::plan::{NodeKind, RelNode};

lazy_static! {
    static ref CALC_OVER_CALC: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Calc(_)),
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Calc(_)),
    );
}

/// PhysicalCalc over PhysicalCalc -> one PhysicalCalc computing the
/// composition. Program merging is associative, so repeated application
/// converges on the same program no matter the grouping.
#[derive(Clone, Debug, Default)]
pub struct CalcMergeRule;

impl Rule for CalcMergeRule {
    fn pattern(&self) -> &Pattern {
        &CALC_OVER_CALC
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let outer = opt_expr
            .root
            .plan()
            .as_calc()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("CalcMerge outer is not a calc".into()))?;
        let inner_plan = opt_expr.children[0].root.plan().clone();
        let inner = inner_plan
            .as_calc()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("CalcMerge inner is not a calc".into()))?;
        let input = inner_plan.input(0);

        let merged = Program::merge(&outer, &inner, input.row_type())?;
        let new_plan = RelNode::physical_calc(merged, input);
        result.push(OptExpr::new(
            OptExprNode::Plan(new_plan),
            opt_expr.children[0].children.clone(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::expr::{BinaryOperator, ScalarExpr};
    use crate::optimizer::test_util::*;

    #[test]
    fn test_merges_into_single_calc() {
        let scan = RelNode::physical_scan(replicated_table());
        // inner: select r_id where r_id > 0; outer: select r_id * 2 as d
        let inner = RelNode::physical_calc(
            Program::new(
                vec![ScalarExpr::input_ref(0)],
                vec!["r_id".into()],
                Some(col_cmp(0, BinaryOperator::Gt, 0)),
            ),
            scan.clone(),
        );
        let outer = RelNode::physical_calc(
            Program::new(
                vec![ScalarExpr::binary(
                    BinaryOperator::Multiply,
                    ScalarExpr::input_ref(0),
                    ScalarExpr::constant(2i64),
                )],
                vec!["d".into()],
                None,
            ),
            inner,
        );

        let mut result = Substitute::default();
        CalcMergeRule
            .apply(OptExpr::from_plan(&outer), &mut result)
            .unwrap();

        let plan = result.opt_exprs[0].to_plan();
        let program = plan.as_calc().unwrap();
        assert_eq!(program.condition_conjuncts().len(), 1);
        assert_eq!(plan.row_type(), outer.row_type());
        assert!(matches!(plan.input(0).kind(), NodeKind::TableScan(_)));
    }
}
