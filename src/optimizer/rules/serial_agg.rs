//! Downgrade a hash aggregate to streaming (serial) aggregation when its
//! input arrives grouped.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::plan::{Collation, NodeKind, RelNode};

lazy_static! {
    static ref HASH_AGG_OVER_PHYSICAL: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::HashAggregate(_)),
        |p| p.is_physical(),
    );
}

/// PhysicalHashAggregate -> PhysicalSerialAggregate when the input collation
/// covers the group keys ascending: rows of one group arrive adjacent, so
/// the aggregate needs no hash table and emits groups in key order.
#[derive(Clone, Debug, Default)]
pub struct HashToSerialAggRule;

impl Rule for HashToSerialAggRule {
    fn pattern(&self) -> &Pattern {
        &HASH_AGG_OVER_PHYSICAL
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let agg = opt_expr
            .root
            .plan()
            .as_aggregate()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("HashToSerialAgg root is not an aggregate".into()))?;
        if agg.group_by.is_empty() {
            return Ok(());
        }
        let child_plan = opt_expr.children[0].root.plan().clone();
        let required = Collation::ascending_on(agg.group_by.iter().copied());
        if !child_plan.collation().satisfies(&required) {
            return Ok(());
        }

        let new_plan = RelNode::serial_aggregate(agg.group_by, agg.calls, agg.stage, child_plan);
        result.push(OptExpr::new(OptExprNode::Plan(new_plan), opt_expr.children));
        Ok(())
    }
}
