mod aggregate;
mod filter;
mod join;
mod projection;
mod scan;
mod sink;

pub use aggregate::PhysicalAggregate;
pub use filter::PhysicalFilter;
pub use join::PhysicalJoin;
pub use projection::PhysicalProjection;
pub use scan::PhysicalScan;
pub use sink::PhysicalSink;

use crate::error::EvalResult;
use crate::value::Tuple;

/// which input of a stage a tuple arrives on
/// single-input stages only ever see Left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// physical stage (push-based execution)
/// one variant per relational node type, so every stage kind is matched exhaustively
pub enum Stage {
    Scan(PhysicalScan),
    Filter(PhysicalFilter),
    Project(PhysicalProjection),
    Join(PhysicalJoin),
    Aggregate(PhysicalAggregate),
    Sink(PhysicalSink),
}

impl Stage {
    /// consume one input tuple, appending zero or more outputs
    pub fn push(&mut self, side: Side, tuple: Tuple, output: &mut Vec<Tuple>) -> EvalResult<()> {
        match self {
            Stage::Scan(scan) => scan.push(tuple, output),
            Stage::Filter(filter) => filter.push(tuple, output),
            Stage::Project(projection) => projection.push(tuple, output),
            Stage::Join(join) => join.push(side, tuple, output),
            Stage::Aggregate(aggregate) => aggregate.push(tuple),
            Stage::Sink(sink) => sink.push(tuple),
        }
    }

    /// close the current window, emitting whatever buffered state produces
    pub fn flush(&mut self, output: &mut Vec<Tuple>) -> EvalResult<()> {
        match self {
            Stage::Scan(_) | Stage::Filter(_) | Stage::Project(_) => Ok(()),
            Stage::Join(join) => join.flush(output),
            Stage::Aggregate(aggregate) => aggregate.flush(output),
            Stage::Sink(sink) => sink.flush(),
        }
    }

    /// drop buffered window state without emitting it
    pub fn reset(&mut self) {
        match self {
            Stage::Join(join) => join.reset(),
            Stage::Aggregate(aggregate) => aggregate.reset(),
            Stage::Scan(_) | Stage::Filter(_) | Stage::Project(_) | Stage::Sink(_) => {}
        }
    }

    /// same compiled stage with empty runtime state, for another partition
    pub fn fresh(&self) -> Stage {
        match self {
            Stage::Scan(scan) => Stage::Scan(scan.clone()),
            Stage::Filter(filter) => Stage::Filter(filter.clone()),
            Stage::Project(projection) => Stage::Project(projection.clone()),
            Stage::Join(join) => Stage::Join(join.fresh()),
            Stage::Aggregate(aggregate) => Stage::Aggregate(aggregate.fresh()),
            Stage::Sink(sink) => Stage::Sink(sink.clone()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Stage::Scan(scan) => format!("PhysicalScan (Source: {})", scan.source()),
            Stage::Filter(filter) => format!("PhysicalFilter (Condition: {})", filter.describe()),
            Stage::Project(projection) => {
                format!("PhysicalProjection (Output: {})", projection.describe())
            }
            Stage::Join(join) => format!("PhysicalJoin ({})", join.describe()),
            Stage::Aggregate(aggregate) => {
                format!("PhysicalAggregate ({})", aggregate.describe())
            }
            Stage::Sink(sink) => format!("PhysicalSink (Target: {})", sink.target()),
        }
    }
}
