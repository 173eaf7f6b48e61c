use crate::plan::{NodeKind, RelNode, RelRef};

/// Cost comparison used to rank equivalent alternatives. The planner takes
/// an implementation at construction; the model's internals are not part of
/// this crate's contract.
pub trait CostModel: Send + Sync {
    fn plan_cost(&self, plan: &RelRef) -> f64;
}

/// Default model: every operator costs one, data movement costs more, and a
/// sort under a merge exchange is cheaper than a coordinator sort of the
/// whole result.
#[derive(Default)]
pub struct OperatorCountCost;

impl OperatorCountCost {
    fn node_cost(node: &RelNode) -> f64 {
        match node.kind() {
            NodeKind::Dummy => 0.0,
            NodeKind::SingletonExchange(_) => 4.0,
            NodeKind::UnionExchange(_) | NodeKind::MergeExchange(_) => 6.0,
            // a fragment sorts 1/N of the data
            NodeKind::Sort(_) => 3.0 / node.split_count().max(1) as f64,
            NodeKind::HashAggregate(_) => 2.0,
            _ => 1.0,
        }
    }
}

impl CostModel for OperatorCountCost {
    fn plan_cost(&self, plan: &RelRef) -> f64 {
        let mut cost = Self::node_cost(plan);
        for child in plan.children() {
            cost += self.plan_cost(&child);
        }
        cost
    }
}
