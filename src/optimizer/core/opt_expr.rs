use std::fmt::Debug;

use crate::plan::{RelNode, RelRef};

pub type OptExprNodeId = usize;

#[derive(Clone)]
pub enum OptExprNode {
    /// Raw plan node with dummy children.
    Plan(RelRef),
    /// Existing node in the search-space graph, bound by id.
    Existing(OptExprNodeId),
}

impl Debug for OptExprNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plan(plan) => write!(f, "Plan({})", plan.name()),
            Self::Existing(id) => write!(f, "Existing({})", id),
        }
    }
}

impl OptExprNode {
    pub fn plan(&self) -> &RelRef {
        match self {
            OptExprNode::Plan(plan) => plan,
            OptExprNode::Existing(_) => {
                panic!("OptExprNode::plan() called on OptExprNode::Existing")
            }
        }
    }
}

/// A sub-plan-tree binding used between the matcher and a rule. Every root
/// is either a new node (added to the graph on substitution) or an existing
/// graph node (reconnected in place).
#[derive(Clone, Debug)]
pub struct OptExpr {
    pub root: OptExprNode,
    pub children: Vec<OptExpr>,
}

impl OptExpr {
    pub fn new(root: OptExprNode, children: Vec<OptExpr>) -> Self {
        Self { root, children }
    }

    pub fn from_plan(plan: &RelRef) -> Self {
        let children = plan.children().iter().map(OptExpr::from_plan).collect();
        OptExpr {
            root: OptExprNode::Plan(plan.clone()),
            children,
        }
    }

    pub fn to_plan(&self) -> RelRef {
        match &self.root {
            OptExprNode::Plan(p) => {
                let children = self.children.iter().map(|c| c.to_plan()).collect();
                p.clone_with_children(children)
            }
            OptExprNode::Existing(_) => RelNode::dummy(),
        }
    }
}
