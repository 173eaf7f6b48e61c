use super::graph::{HepGraph, HepNodeId};
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, PatternChildren, PatternMatcher};

/// Walks the graph from `start_id` checking a rule's operand pattern.
pub struct HepMatcher<'a, 'b> {
    pub pattern: &'a Pattern,
    pub start_id: HepNodeId,
    pub graph: &'b HepGraph,
}

impl<'a, 'b> HepMatcher<'a, 'b> {
    pub fn new(pattern: &'a Pattern, start_id: HepNodeId, graph: &'b HepGraph) -> Self {
        Self {
            pattern,
            start_id,
            graph,
        }
    }
}

impl PatternMatcher for HepMatcher<'_, '_> {
    fn match_opt_expr(&self) -> Option<OptExpr> {
        let start_node = self.graph.node_plan(self.start_id);
        if !(self.pattern.predicate)(start_node) {
            return None;
        }
        let opt_expr = match &self.pattern.children {
            PatternChildren::MatchedRecursive => self.graph.to_opt_expr(self.start_id),
            PatternChildren::Predicate(children_patterns) => {
                let child_ids = self.graph.children_at(self.start_id);
                if child_ids.len() < children_patterns.len() {
                    return None;
                }
                let mut children_opt_exprs = vec![];
                for (idx, child_pattern) in children_patterns.iter().enumerate() {
                    // the child patterns bind in plan order
                    let m = HepMatcher::new(child_pattern, child_ids[idx], self.graph);
                    children_opt_exprs.push(m.match_opt_expr()?);
                }
                OptExpr {
                    // regenerate the root: a previous rule may have changed
                    // its children
                    root: OptExprNode::Plan(self.graph.to_plan_start_from(self.start_id)),
                    children: children_opt_exprs,
                }
            }
            PatternChildren::None => {
                let children_opt_exprs = self
                    .graph
                    .children_at(self.start_id)
                    .into_iter()
                    .map(|id| OptExpr {
                        root: OptExprNode::Existing(id.index()),
                        children: vec![],
                    })
                    .collect();
                OptExpr {
                    root: OptExprNode::Plan(self.graph.to_plan_start_from(self.start_id)),
                    children: children_opt_exprs,
                }
            }
        };
        Some(opt_expr)
    }
}
