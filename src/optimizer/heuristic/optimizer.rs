use std::sync::Arc;

use log::{debug, trace};

use super::batch::HepBatch;
use super::graph::{HepGraph, HepNodeId};
use super::matcher::HepMatcher;
use crate::error::PlannerError;
use crate::optimizer::core::{OptExprNode, PatternMatcher, Rule, Substitute};
use crate::optimizer::cost::CostModel;
use crate::optimizer::rules::RuleImpl;
use crate::plan::{pretty_plan_tree, RelRef};

/// Drives rule batches over one compilation's search space until fixpoint or
/// the batch iteration ceiling, whichever comes first.
pub struct HepOptimizer {
    batches: Vec<HepBatch>,
    graph: HepGraph,
    cost_model: Arc<dyn CostModel>,
    applied_rules: usize,
}

impl HepOptimizer {
    pub fn new(batches: Vec<HepBatch>, root: RelRef, cost_model: Arc<dyn CostModel>) -> Self {
        Self {
            batches,
            graph: HepGraph::new(root),
            cost_model,
            applied_rules: 0,
        }
    }

    /// Total rule applications so far; termination tests assert on it.
    pub fn applied_rules(&self) -> usize {
        self.applied_rules
    }

    pub fn find_best(&mut self) -> Result<RelRef, PlannerError> {
        let batches = self.batches.clone();
        for batch in batches {
            let mut iteration = 1_usize;
            // fixed_point means the plan tree did not change in a full pass.
            let mut fixed_point = false;
            while !fixed_point {
                debug!("start batch {}, iteration {}", batch.name, iteration);

                fixed_point = self.apply_batch(&batch)?;

                // the iteration ceiling outranks fixpoint detection
                iteration += 1;
                if iteration > batch.strategy.max_iteration {
                    debug!(
                        "max iteration {} reached for batch {}",
                        iteration - 1,
                        batch.name
                    );
                    break;
                }
            }
            if fixed_point {
                debug!(
                    "fixed point reached for batch {} after {} iterations",
                    batch.name,
                    iteration - 1
                );
            }
        }
        Ok(self.graph.to_plan())
    }

    fn apply_batch(&mut self, batch: &HepBatch) -> Result<bool, PlannerError> {
        let original_plan = self.graph.to_plan();

        for rule in batch.rules.iter() {
            for node_id in self.graph.nodes_iter(batch.strategy.match_order) {
                if self.graph.is_superseded(node_id) {
                    continue;
                }
                if !self.apply_rule(rule.clone(), node_id)? {
                    continue;
                }
                trace!(
                    "plan after {:?}:\n{}",
                    rule,
                    pretty_plan_tree(&self.graph.to_plan())
                );
                // a rule fired; move on to the next rule in the batch
                break;
            }
        }

        let reach_fixed_point = original_plan == self.graph.to_plan();
        debug!(
            "batch {} finished, fixed_point: {}",
            batch.name, reach_fixed_point
        );
        Ok(reach_fixed_point)
    }

    /// Returns true when the rule matched and changed the plan tree.
    fn apply_rule(&mut self, rule: RuleImpl, node_id: HepNodeId) -> Result<bool, PlannerError> {
        let matcher = HepMatcher::new(rule.pattern(), node_id, &self.graph);
        let Some(opt_expr) = matcher.match_opt_expr() else {
            return Ok(false);
        };

        let mut substitute = Substitute::default();
        rule.apply(opt_expr, &mut substitute)?;

        if substitute.opt_exprs.is_empty() {
            // matched but refused: a precondition failed, not an error
            return Ok(false);
        }

        // Alternatives in a substitute are result-set equivalent; rank them
        // with the cost model and install the winner.
        let winner = if substitute.opt_exprs.len() == 1 {
            substitute.opt_exprs.pop().expect("non-empty substitute")
        } else {
            substitute
                .opt_exprs
                .iter()
                .map(|alt| {
                    // Rules construct roots over the real input subtrees, so
                    // the stored plan prices correctly; `to_plan` would
                    // substitute dummies for opaque bindings.
                    let plan = match &alt.root {
                        OptExprNode::Plan(p) => p.clone(),
                        OptExprNode::Existing(_) => alt.to_plan(),
                    };
                    (self.cost_model.plan_cost(&plan), alt)
                })
                .min_by(|(a, _), (b, _)| a.total_cmp(b))
                .map(|(cost, alt)| {
                    trace!("{:?} picked alternative with cost {}", rule, cost);
                    alt.clone()
                })
                .expect("non-empty substitute")
        };

        let new_root = self.graph.replace_node(node_id, winner);
        if substitute.mark_superseded {
            self.graph.mark_superseded(new_root);
        }
        self.applied_rules += 1;
        debug!("applied {:?} at node {:?}", rule, node_id);
        Ok(true)
    }
}
