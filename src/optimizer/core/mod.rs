mod opt_expr;
mod pattern;
mod rule;

pub use opt_expr::*;
pub use pattern::*;
pub use rule::*;

/// Implemented by the matcher over the search-space graph.
pub trait PatternMatcher {
    fn match_opt_expr(&self) -> Option<OptExpr>;
}
