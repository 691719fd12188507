pub mod aggregate;
pub mod expression;
pub mod logic;
pub mod planner;

pub use aggregate::{Accumulator, AggregateCompiler, CompiledAggregate};
pub use expression::{CompiledExpression, ExpressionCompiler};
pub use logic::Truth;
pub use planner::PlanCompiler;
