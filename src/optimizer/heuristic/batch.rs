use crate::optimizer::rules::RuleImpl;

#[derive(Clone, Copy)]
pub enum HepMatchOrder {
    /// Match from root down. A match attempt at an ancestor always precedes
    /// all match attempts at its descendants.
    TopDown,
    /// Match from leaves up.
    BottomUp,
}

/// A named group of rules driven to fixpoint together.
#[derive(Clone)]
pub struct HepBatch {
    pub name: String,
    pub strategy: HepBatchStrategy,
    pub rules: Vec<RuleImpl>,
}

impl HepBatch {
    pub fn new(name: String, strategy: HepBatchStrategy, rules: Vec<RuleImpl>) -> Self {
        Self {
            name,
            strategy,
            rules,
        }
    }
}

#[derive(Clone)]
pub struct HepBatchStrategy {
    /// Ceiling on batch iterations. Rule cycles are intentional in the
    /// distributed transforms, so termination must never rest on fixpoint
    /// alone.
    pub max_iteration: usize,
    pub match_order: HepMatchOrder,
}

impl HepBatchStrategy {
    pub fn fix_point_topdown(max_iteration: usize) -> Self {
        Self {
            max_iteration,
            match_order: HepMatchOrder::TopDown,
        }
    }

    /// Bottom-up fixpoint; lowering converts leaves before their parents.
    pub fn fix_point_bottomup(max_iteration: usize) -> Self {
        Self {
            max_iteration,
            match_order: HepMatchOrder::BottomUp,
        }
    }
}
