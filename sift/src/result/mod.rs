//! Result trees: assembly from fetched resources and post-processing.

mod assembly;
mod postprocess;
mod tree;

pub use assembly::assemble;
pub use postprocess::{HrefPostProcessor, PostProcessor, RequestHrefPostProcessor, ResultPostProcessor};
pub use tree::{NodeId, ResultTree};
