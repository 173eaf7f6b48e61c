pub mod collation;
pub mod core;
pub mod cost;
pub mod heuristic;
pub mod index_select;
mod planner;
pub mod rules;

#[cfg(test)]
pub(crate) mod test_util;

pub use planner::{PhysicalPlan, PhysicalPlanner};
