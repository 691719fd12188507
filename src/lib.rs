pub mod compiler;
pub mod config;
pub mod error;
pub mod execution;
pub mod io;
pub mod logging;
pub mod plan;
pub mod registry;
pub mod schema;
pub mod value;

pub use compiler::{
    Accumulator, AggregateCompiler, CompiledExpression, ExpressionCompiler, PlanCompiler, Truth,
};
pub use config::Config;
pub use error::{CompileError, CompileErrorKind, CompileResult, EvalResult, EvaluationError};
pub use execution::{ExecutionStats, Pipeline, PipelineExecutor};
pub use io::{CollectSink, CsvSink, CsvSource, MemorySource, SinkWriter, SourceReader};
pub use plan::{AggregateCall, Expression, JoinType, NamedExpression, RelNode};
pub use registry::Registry;
pub use schema::{DataType, Field, Schema};
pub use value::{GroupKey, Tuple, Value};

/// compile a relational plan against a registry
pub fn compile(root: &RelNode, registry: &Registry) -> CompileResult<Pipeline> {
    PlanCompiler::new(registry).compile(root)
}
