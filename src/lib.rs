pub mod dense;
pub mod dimred;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod record;
mod utils;

pub use pipeline::{run, run_with, PipelineConfig};
pub use record::{CellSeparator, ParseError};
pub use utils::FloatOps;
