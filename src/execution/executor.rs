use super::pipeline::Pipeline;
use crate::error::{EvalResult, EvaluationError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// counters for one executor run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStats {
    pub tuples_read: usize,
    pub tuples_emitted: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// pipeline executor that drives push-based execution
/// drains every source reader into the pipeline, then closes the window once
pub struct PipelineExecutor {
    pipeline: Pipeline,
    interrupt: Option<Arc<AtomicBool>>,
}

impl PipelineExecutor {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            interrupt: None,
        }
    }

    /// stop feeding tuples once the flag is set; the window is still flushed
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn into_pipeline(self) -> Pipeline {
        self.pipeline
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn execute(&mut self) -> EvalResult<ExecutionStats> {
        let start = Instant::now();
        let mut stats = ExecutionStats::default();
        let emitted_before = self.pipeline.emitted();

        'sources: for source in self.pipeline.sources() {
            let factory = self
                .pipeline
                .reader(&source)
                .ok_or_else(|| EvaluationError::MissingReader(source.clone()))?;
            let mut reader = factory()?;
            let mut count = 0usize;
            while let Some(tuple) = reader.next_tuple()? {
                if self.interrupted() {
                    warn!(source = %source, "execution interrupted");
                    stats.interrupted = true;
                    break 'sources;
                }
                self.pipeline.consume(&source, tuple)?;
                count += 1;
            }
            debug!(source = %source, tuples = count, "source drained");
            stats.tuples_read += count;
        }

        self.pipeline.flush()?;
        stats.tuples_emitted = self.pipeline.emitted() - emitted_before;
        stats.elapsed = start.elapsed();
        info!(
            read = stats.tuples_read,
            emitted = stats.tuples_emitted,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "execution finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::PlanCompiler;
    use crate::plan::{RelNode, field, lit};
    use crate::registry::Registry;
    use crate::schema::{DataType, Schema};
    use crate::tuple;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_memory_source(
            "FOO",
            Schema::of(&[("ID", DataType::Integer)]),
            (1..=4).map(|i| tuple![i]).collect(),
        );
        registry
    }

    #[test]
    fn test_execute_collects_root_output() {
        let registry = registry();
        let plan = RelNode::scan("FOO").filter(field("ID").gt(lit(2)));
        let pipeline = PlanCompiler::new(&registry).compile(&plan).unwrap();
        let mut executor = PipelineExecutor::new(pipeline);
        let stats = executor.execute().unwrap();
        assert_eq!(stats.tuples_read, 4);
        assert_eq!(stats.tuples_emitted, 2);
        assert!(!stats.interrupted);
        assert_eq!(
            executor.pipeline_mut().take_results(),
            vec![tuple![3], tuple![4]]
        );
    }

    #[test]
    fn test_interrupt_stops_feeding() {
        let registry = registry();
        let pipeline = PlanCompiler::new(&registry)
            .compile(&RelNode::scan("FOO"))
            .unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let stats = PipelineExecutor::new(pipeline)
            .with_interrupt(flag)
            .execute()
            .unwrap();
        assert!(stats.interrupted);
        assert_eq!(stats.tuples_read, 0);
    }

    #[test]
    fn test_missing_reader() {
        let mut registry = Registry::new();
        registry.register_source("BARE", Schema::of(&[("A", DataType::Integer)]));
        let pipeline = PlanCompiler::new(&registry)
            .compile(&RelNode::scan("BARE"))
            .unwrap();
        let err = PipelineExecutor::new(pipeline).execute().unwrap_err();
        assert!(matches!(err, EvaluationError::MissingReader(name) if name == "BARE"));
    }
}
