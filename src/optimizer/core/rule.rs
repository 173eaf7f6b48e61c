use enum_dispatch::enum_dispatch;

use super::{OptExpr, Pattern};
use crate::error::PlannerError;

/// A rewrite rule. Two kinds exist: conversion rules (logical → physical
/// lowering) and distributed transform rules (relocation across exchanges).
///
/// `apply` is a pure function from the matched binding to zero or more
/// complete replacement trees. A failed precondition is expressed by writing
/// nothing — never by an error; `Err` is reserved for internal planner bugs.
#[enum_dispatch]
pub trait Rule {
    /// The operand pattern deciding whether the rule can be attempted.
    fn pattern(&self) -> &Pattern;

    /// Apply the rule, writing replacement trees to `result`.
    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError>;
}

/// The transformed alternatives a rule produced.
///
/// When more than one tree is registered they must be result-set equivalent;
/// the engine ranks them with the cost model and installs the winner. Each
/// tree must expose the matched root's output row type.
#[derive(Default)]
pub struct Substitute {
    pub opt_exprs: Vec<OptExpr>,
    /// Record the replacement root as superseded: the engine will not use it
    /// as a match root again. Rules whose output structurally resembles
    /// their own input set this instead of relying on luck to terminate.
    pub mark_superseded: bool,
}

impl Substitute {
    pub fn push(&mut self, opt_expr: OptExpr) {
        self.opt_exprs.push(opt_expr);
    }

    pub fn push_superseded(&mut self, opt_expr: OptExpr) {
        self.opt_exprs.push(opt_expr);
        self.mark_superseded = true;
    }
}
