use std::collections::HashSet;

use ahash::RandomState;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Bfs;

use super::HepMatchOrder;
use crate::optimizer::core::{OptExpr, OptExprNode, OptExprNodeId};
use crate::plan::RelRef;

/// HepNodeId identifies a node in the search-space graph.
pub type HepNodeId = NodeIndex<OptExprNodeId>;

#[derive(Clone, Debug)]
pub struct HepNode {
    id: HepNodeId,
    plan: RelRef,
}

/// The search space of one compilation: the current plan tree stored as a
/// graph so rules can splice subtrees, plus the set of superseded nodes the
/// matcher must skip. Discarded wholesale when compilation ends.
#[derive(Debug)]
pub struct HepGraph {
    graph: StableDiGraph<HepNode, (), usize>,
    root: HepNodeId,
    /// Nodes recorded as dead/superseded by a rule; never match roots again.
    superseded: HashSet<HepNodeId, RandomState>,
}

impl HepGraph {
    pub fn new(root: RelRef) -> Self {
        let mut graph = Self {
            graph: StableDiGraph::default(),
            root: HepNodeId::default(),
            superseded: HashSet::default(),
        };
        let opt_expr = OptExpr::from_plan(&root);
        graph.root = graph.add_opt_expr(opt_expr);
        graph
    }

    pub fn children_at(&self, id: HepNodeId) -> Vec<HepNodeId> {
        self.graph
            .neighbors_directed(id, petgraph::Direction::Outgoing)
            .collect()
    }

    /// DFS visitor adding an optimizer expression and rectifying edges.
    fn add_opt_expr(&mut self, opt_expr: OptExpr) -> HepNodeId {
        match opt_expr.root {
            // existing graph node, just reconnect
            OptExprNode::Existing(id) => HepNodeId::new(id),
            OptExprNode::Plan(plan) => {
                let new_node_id = self.graph.add_node(HepNode {
                    // fake id, fixed right after add_node
                    id: HepNodeId::default(),
                    plan,
                });
                self.graph[new_node_id].id = new_node_id;

                // Insert children reversed: neighbors_directed(Outgoing)
                // yields them in reverse insertion order, and the matcher
                // relies on children_at returning plan order.
                let children_ids = opt_expr
                    .children
                    .into_iter()
                    .rev()
                    .map(|c| self.add_opt_expr(c))
                    .collect::<Vec<_>>();
                for child_id in children_ids {
                    self.graph.add_edge(new_node_id, child_id, ());
                }
                new_node_id
            }
        }
    }

    /// Reconstruct the full plan tree from the graph.
    pub fn to_plan(&self) -> RelRef {
        self.to_plan_start_from(self.root)
    }

    pub fn to_plan_start_from(&self, start: HepNodeId) -> RelRef {
        let children = self
            .children_at(start)
            .iter()
            .map(|&id| self.to_plan_start_from(id))
            .collect::<Vec<_>>();
        self.graph[start].plan.clone_with_children(children)
    }

    pub fn to_opt_expr(&self, start: HepNodeId) -> OptExpr {
        let children = self
            .children_at(start)
            .iter()
            .map(|&id| self.to_opt_expr(id))
            .collect();
        OptExpr::new(OptExprNode::Plan(self.graph[start].plan.clone()), children)
    }

    fn bfs(&self, start: HepNodeId) -> Vec<HepNodeId> {
        let mut ids = Vec::with_capacity(self.graph.node_count());
        let mut iter = Bfs::new(&self.graph, start);
        while let Some(node_id) = iter.next(&self.graph) {
            ids.push(node_id);
        }
        ids
    }

    pub fn nodes_iter(&self, order: HepMatchOrder) -> Box<dyn Iterator<Item = HepNodeId>> {
        let ids = self.bfs(self.root);
        match order {
            HepMatchOrder::TopDown => Box::new(ids.into_iter()),
            HepMatchOrder::BottomUp => Box::new(ids.into_iter().rev()),
        }
    }

    pub fn node_plan(&self, id: HepNodeId) -> &RelRef {
        &self.graph[id].plan
    }

    /// Explicit dead marking replacing the original's "importance = 0" side
    /// channel: the matcher refuses superseded nodes as match roots.
    pub fn mark_superseded(&mut self, id: HepNodeId) {
        self.superseded.insert(id);
    }

    pub fn is_superseded(&self, id: HepNodeId) -> bool {
        self.superseded.contains(&id)
    }

    /// Splice a replacement subtree over `old_node_id`, reparenting and
    /// dropping whatever the replacement unlinked. Returns the new root id
    /// of the spliced subtree.
    pub fn replace_node(&mut self, old_node_id: HepNodeId, new_opt_expr: OptExpr) -> HepNodeId {
        let new_node_id = self.add_opt_expr(new_opt_expr);

        let parent_ids = self
            .graph
            .neighbors_directed(old_node_id, petgraph::Direction::Incoming)
            .collect::<Vec<_>>();
        for parent_id in parent_ids {
            self.graph.add_edge(parent_id, new_node_id, ());
        }
        self.graph.remove_node(old_node_id);
        self.superseded.remove(&old_node_id);

        if self.root == old_node_id {
            self.root = new_node_id;
        }

        // drop nodes the replacement unlinked from the root
        let ids_in_plan_tree = self.bfs(self.root);
        if self.graph.node_count() != ids_in_plan_tree.len() {
            self.graph
                .retain_nodes(|_, id| ids_in_plan_tree.contains(&id));
            self.superseded.retain(|id| ids_in_plan_tree.contains(id));
        }
        new_node_id
    }
}
