//! Resolve a filtering Calc over a table scan to an index access path.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::expr::reduce_conjuncts;
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::optimizer::index_select::choose_access_path;
use crate::plan::{NodeKind, RelNode};

lazy_static! {
    static ref CALC_OVER_SCAN: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Calc(_)),
        |p| p.is_physical() && matches!(p.kind(), NodeKind::TableScan(_)),
    );
}

/// PhysicalCalc over PhysicalTableScan -> PhysicalCalc over
/// PhysicalIndexScan when an index covers a usable prefix of the filter.
/// The covered conjuncts move into the access path; the calc keeps exactly
/// the residual.
#[derive(Clone, Debug, Default)]
pub struct ScanToIndexRule;

impl Rule for ScanToIndexRule {
    fn pattern(&self) -> &Pattern {
        &CALC_OVER_SCAN
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let program = opt_expr
            .root
            .plan()
            .as_calc()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("ScanToIndex root is not a calc".into()))?;
        let scan_plan = opt_expr.children[0].root.plan().clone();
        let table = scan_plan
            .as_table_scan()
            .map(|p| p.table.clone())
            .ok_or_else(|| PlannerError::Internal("ScanToIndex child is not a scan".into()))?;

        let conjuncts = program.condition_conjuncts();
        if conjuncts.is_empty() || table.indexes.is_empty() {
            return Ok(());
        }
        let Some(path) = choose_access_path(&table.indexes, &conjuncts, None) else {
            return Ok(());
        };

        let residual = reduce_conjuncts(path.residual.clone());
        let row_type = table.row_type();
        let index_scan = RelNode::physical_index_scan(table, path);
        let rewritten = program.with_condition(residual);

        // a calc reduced to the unfiltered identity has nothing left to do
        if rewritten.is_trivial(row_type.arity())
            && rewritten.output_row_type(&row_type) == row_type
        {
            result.push(OptExpr::from_plan(&index_scan));
            return Ok(());
        }
        let new_plan = RelNode::physical_calc(rewritten, index_scan.clone());
        result.push(OptExpr::new(
            OptExprNode::Plan(new_plan),
            vec![OptExpr::from_plan(&index_scan)],
        ));
        Ok(())
    }
}
