//! Make sorts disappear: route scans through an index whose natural order
//! matches the requirement, then drop any sort whose input already delivers
//! its collation.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::expr::reduce_conjuncts;
use crate::optimizer::collation::translate_through_program;
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::optimizer::index_select::choose_access_path;
use crate::plan::{Collation, NodeKind, RelNode, RelRef};

lazy_static! {
    static ref SORT_OVER_SCANNABLE: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Sort(_)),
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Calc(_) | NodeKind::TableScan(_)),
    );
    static ref SORT_OVER_ORDERED: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::Sort(_)),
        |p| p.is_physical(),
    );
}

/// PhysicalSort over (Calc over) PhysicalTableScan -> the same sort over an
/// index scan whose key order matches the requirement, scan direction flipped
/// when the requirement is uniformly descending. Through a Calc, the
/// requirement is translated backward; any computed sort column refuses.
///
/// The sort itself stays; [`SortRemoveRule`] drops it once the new input
/// provably delivers the order.
#[derive(Clone, Debug, Default)]
pub struct SortScanToIndexRule;

impl Rule for SortScanToIndexRule {
    fn pattern(&self) -> &Pattern {
        &SORT_OVER_SCANNABLE
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let sort_plan = opt_expr.root.plan().clone();
        let sort = sort_plan
            .as_sort()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("SortScanToIndex root is not a sort".into()))?;
        if sort.collation.is_empty() {
            return Ok(());
        }
        let child_plan = opt_expr.children[0].root.plan().clone();

        let new_child: Option<RelRef> = match child_plan.kind() {
            NodeKind::TableScan(scan) => ordered_index_scan(&scan.table, &[], &sort.collation),
            NodeKind::Calc(program) => {
                let input = child_plan.input(0);
                let Some(scan) = input.as_table_scan() else {
                    return Ok(());
                };
                let Some(wanted) = translate_through_program(&sort.collation, program) else {
                    return Ok(());
                };
                ordered_index_scan(&scan.table, &program.condition_conjuncts(), &wanted).map(
                    |index_scan| {
                        let residual =
                            reduce_conjuncts(index_scan.as_index_scan().map(|p| p.access.residual.clone()).unwrap_or_default());
                        RelNode::physical_calc(program.with_condition(residual), index_scan)
                    },
                )
            }
            _ => None,
        };
        let Some(new_child) = new_child else {
            return Ok(());
        };

        let new_sort = RelNode::physical_sort(sort, new_child.clone());
        result.push(OptExpr::new(
            OptExprNode::Plan(new_sort),
            vec![OptExpr::from_plan(&new_child)],
        ));
        Ok(())
    }
}

fn ordered_index_scan(
    table: &crate::catalog::TableCatalog,
    conjuncts: &[crate::expr::ScalarExpr],
    wanted: &Collation,
) -> Option<RelRef> {
    let path = choose_access_path(&table.indexes, conjuncts, Some(wanted))?;
    if !path.order_matches {
        return None;
    }
    Some(RelNode::physical_index_scan(table.clone(), path))
}

/// PhysicalSort whose input already delivers the required collation. An
/// unlimited sort vanishes outright; one carrying fetch/offset degrades to a
/// PhysicalLimit, which keeps the row cap without re-sorting.
#[derive(Clone, Debug, Default)]
pub struct SortRemoveRule;

impl Rule for SortRemoveRule {
    fn pattern(&self) -> &Pattern {
        &SORT_OVER_ORDERED
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let sort = opt_expr
            .root
            .plan()
            .as_sort()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("SortRemove root is not a sort".into()))?;
        if sort.collation.is_empty() {
            return Ok(());
        }
        let child_binding = opt_expr.children[0].clone();
        let child_plan = child_binding.root.plan().clone();
        if !child_plan.collation().satisfies(&sort.collation) {
            return Ok(());
        }

        if sort.is_unlimited() {
            result.push(child_binding);
        } else {
            let limit = RelNode::physical_limit(sort.fetch, sort.offset, child_plan);
            result.push(OptExpr::new(OptExprNode::Plan(limit), vec![child_binding]));
        }
        Ok(())
    }
}
