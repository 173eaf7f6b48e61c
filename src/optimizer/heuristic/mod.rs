mod batch;
mod graph;
mod matcher;
mod optimizer;

pub use batch::*;
pub use graph::*;
pub use matcher::*;
pub use optimizer::*;
