use crate::plan::RelNode;

/// The shape constraint a rule puts on its children.
pub enum PatternChildren {
    /// Match the whole subtree recursively; the rule sees every node.
    MatchedRecursive,
    /// Each child must satisfy the corresponding nested pattern, in order.
    Predicate(Vec<Pattern>),
    /// Children are not inspected; they are bound as opaque graph nodes.
    None,
}

/// An operand pattern: a node predicate, optionally nested to require
/// specific child shapes. Patterns decide whether a rule can fire; the
/// transform itself re-checks anything semantic.
pub struct Pattern {
    pub predicate: fn(&RelNode) -> bool,
    pub children: PatternChildren,
}

impl Pattern {
    /// A single-operand pattern that leaves children unbound.
    pub fn leaf(predicate: fn(&RelNode) -> bool) -> Self {
        Pattern {
            predicate,
            children: PatternChildren::None,
        }
    }

    /// Parent-over-child, the shape every transpose rule uses.
    pub fn on_child(predicate: fn(&RelNode) -> bool, child: fn(&RelNode) -> bool) -> Self {
        Pattern {
            predicate,
            children: PatternChildren::Predicate(vec![Pattern::leaf(child)]),
        }
    }
}
