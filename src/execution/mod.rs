pub mod executor;
pub mod operators;
pub mod pipeline;

pub use executor::{ExecutionStats, PipelineExecutor};
pub use operators::{Side, Stage};
pub use pipeline::{Pipeline, PipelineBuilder, StageId};
