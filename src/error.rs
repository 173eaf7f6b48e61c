/// Errors surfaced by the physical planner.
///
/// A rule whose precondition fails simply does not fire; that is never an
/// error. `Internal` marks a planner-bug condition (e.g. a merged program
/// whose row type diverges from the original) and aborts the compilation.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PlannerError {
    #[error("internal planner error: {0}")]
    Internal(String),
}
