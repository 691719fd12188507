use crate::compiler::aggregate::{Accumulator, CompiledAggregate};
use crate::error::EvalResult;
use crate::value::{GroupKey, Tuple, Value};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::trace;

/// physical operator for grouped aggregation
/// consumes rows into per-group accumulators and emits one row per group at window close
pub struct PhysicalAggregate {
    aggregate: Arc<CompiledAggregate>,
    groups: IndexMap<GroupKey, Vec<Box<dyn Accumulator>>>,
}

impl PhysicalAggregate {
    pub fn new(aggregate: CompiledAggregate) -> Self {
        Self {
            aggregate: Arc::new(aggregate),
            groups: IndexMap::new(),
        }
    }

    pub fn fresh(&self) -> Self {
        Self {
            aggregate: self.aggregate.clone(),
            groups: IndexMap::new(),
        }
    }

    pub fn describe(&self) -> String {
        let groups: Vec<&str> = self
            .aggregate
            .group_by
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        let calls: Vec<String> = self
            .aggregate
            .calls
            .iter()
            .map(|c| format!("{} AS {}", c.function, c.name))
            .collect();
        format!("Group: [{}], Aggregates: [{}]", groups.join(", "), calls.join(", "))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn reset(&mut self) {
        self.groups.clear();
    }

    pub fn push(&mut self, tuple: Tuple) -> EvalResult<()> {
        let key = self.aggregate.group_key(&tuple)?;
        let aggregate = &self.aggregate;
        let accumulators = self.groups.entry(key).or_insert_with(|| {
            aggregate
                .calls
                .iter()
                .map(|call| call.create_accumulator())
                .collect()
        });
        for (call, accumulator) in aggregate.calls.iter().zip(accumulators.iter_mut()) {
            accumulator.merge(&call.arguments(&tuple)?)?;
        }
        Ok(())
    }

    /// finalize every group, assemble (group key ++ aggregates) and apply the output list
    pub fn flush(&mut self, output: &mut Vec<Tuple>) -> EvalResult<()> {
        trace!(groups = self.groups.len(), "aggregate window closed");
        for (key, accumulators) in self.groups.drain(..) {
            let mut row: Vec<Value> = key.0;
            for accumulator in &accumulators {
                row.push(accumulator.finalize()?);
            }
            output.push(self.aggregate.project(&Tuple::new(row))?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::aggregate::{AggregateCompiler, fuse_projection};
    use crate::plan::{AggregateCall, field};
    use crate::registry::Registry;
    use crate::schema::{DataType, Schema};
    use crate::tuple;

    fn grouped_rows() -> Vec<Tuple> {
        (1..=5).map(|age| tuple![0, age, 40 + age]).collect()
    }

    #[test]
    fn test_group_by_with_post_expression() {
        let schema = Schema::of(&[
            ("GRPID", DataType::Integer),
            ("AGE", DataType::Integer),
            ("SCORE", DataType::Integer),
        ]);
        let registry = Registry::new();
        let mut compiled = AggregateCompiler::new(&schema, &registry)
            .compile(
                &[field("GRPID").named()],
                &[
                    AggregateCall::count_star().alias("CNT"),
                    AggregateCall::new("MAX", vec![field("AGE")]).alias("MAX_AGE"),
                    AggregateCall::new("MIN", vec![field("AGE")]).alias("MIN_AGE"),
                ],
            )
            .unwrap();
        fuse_projection(
            &mut compiled,
            &[
                field("GRPID").named(),
                field("CNT").named(),
                field("MAX_AGE").sub(field("MIN_AGE")).alias("DIFF"),
            ],
            &registry,
        )
        .unwrap();

        let mut aggregate = PhysicalAggregate::new(compiled);
        for row in grouped_rows() {
            aggregate.push(row).unwrap();
        }
        assert_eq!(aggregate.group_count(), 1);

        let mut output = Vec::new();
        aggregate.flush(&mut output).unwrap();
        assert_eq!(output, vec![tuple![0, 5, 4]]);
        assert_eq!(aggregate.group_count(), 0);
    }

    #[test]
    fn test_null_group_key_is_its_own_group() {
        let schema = Schema::of(&[("G", DataType::Integer), ("V", DataType::Integer)]);
        let registry = Registry::new();
        let compiled = AggregateCompiler::new(&schema, &registry)
            .compile(&[field("G").named()], &[AggregateCall::count_star()])
            .unwrap();
        let mut aggregate = PhysicalAggregate::new(compiled);
        for row in [tuple![Value::Null, 1], tuple![Value::Null, 2], tuple![1, 3]] {
            aggregate.push(row).unwrap();
        }
        let mut output = Vec::new();
        aggregate.flush(&mut output).unwrap();
        assert_eq!(output.len(), 2);
        assert!(output.contains(&tuple![Value::Null, 2]));
        assert!(output.contains(&tuple![1, 1]));
    }
}
