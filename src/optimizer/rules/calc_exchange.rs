//! Push row-wise computation below the gather exchange so filters and
//! projections run next to the data.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::plan::{NodeKind, RelNode};

lazy_static! {
    static ref CALC_OVER_UNION: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Calc(_)),
        |p| matches!(p.kind(), NodeKind::UnionExchange(_)),
    );
}

/// PhysicalCalc over UnionExchange -> UnionExchange over PhysicalCalc. A
/// calc is row-wise, so it commutes with the interleaved gather unchanged.
/// The new exchange carries a bumped level and the spliced root is recorded
/// as superseded so the boundary is not renegotiated forever.
#[derive(Clone, Debug, Default)]
pub struct CalcExchangeTransposeRule;

impl Rule for CalcExchangeTransposeRule {
    fn pattern(&self) -> &Pattern {
        &CALC_OVER_UNION
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let program = opt_expr
            .root
            .plan()
            .as_calc()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("CalcExchangeTranspose root is not a calc".into()))?;
        let exchange_plan = opt_expr.children[0].root.plan().clone();
        let level = exchange_plan
            .as_exchange()
            .map(|p| p.level)
            .ok_or_else(|| PlannerError::Internal("CalcExchangeTranspose child is not an exchange".into()))?;
        let fragment = exchange_plan.input(0);

        let pushed = RelNode::physical_calc(program, fragment);
        let union = RelNode::union_exchange(pushed.clone(), level + 1);
        result.push_superseded(OptExpr::new(
            OptExprNode::Plan(union),
            vec![OptExpr::new(
                OptExprNode::Plan(pushed),
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
    use crate::expr::{BinaryOperator, Program};
    use crate::optimizer::test_util::*;

    #[test]
    fn test_calc_moves_into_the_fragment() {
        let scan = RelNode::physical_scan(partitioned_table());
        let union = RelNode::union_exchange(scan.clone(), 0);
        let program = Program::identity(
            scan.row_type(),
            Some(col_cmp(2, BinaryOperator::Gt, 100)),
        );
        let calc = RelNode::physical_calc(program.clone(), union);

        let mut result = Substitute::default();
        CalcExchangeTransposeRule
            .apply(OptExpr::from_plan(&calc), &mut result)
            .unwrap();
        assert!(result.mark_superseded);

        let plan = result.opt_exprs[0].to_plan();
        assert!(matches!(plan.kind(), NodeKind::UnionExchange(_)));
        assert_eq!(plan.as_exchange().unwrap().level, 1);
        let pushed = plan.input(0);
        assert_eq!(pushed.as_calc(), Some(&program));
        assert_eq!(pushed.split_count(), 4);
        assert_eq!(plan.row_type(), calc.row_type());
    }
}
