mod access_path;
mod node;
mod traits;

pub use access_path::*;
pub use node::*;
pub use traits::*;
