//! Physical plan rewriting for a distributed shared-nothing SQL engine.
//!
//! The input is a validated logical plan tree together with catalog metadata
//! (partitioning descriptors, indexes). The output is a single physical plan
//! whose root distribution is `Singleton`, with network data movement made
//! explicit through exchange operators and scans resolved to access paths.

pub mod catalog;
pub mod error;
pub mod expr;
pub mod optimizer;
pub mod plan;
pub mod types;

pub use self::error::PlannerError;
pub use self::optimizer::{PhysicalPlan, PhysicalPlanner};
