use crate::error::EvalResult;
use crate::io::SinkWriter;
use crate::value::Tuple;
use std::sync::Arc;

/// terminal stage of an INSERT: hands every tuple to the target's writer
#[derive(Clone)]
pub struct PhysicalSink {
    target: String,
    writer: Arc<dyn SinkWriter>,
}

impl PhysicalSink {
    pub fn new(target: String, writer: Arc<dyn SinkWriter>) -> Self {
        Self { target, writer }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn push(&mut self, tuple: Tuple) -> EvalResult<()> {
        self.writer.write(tuple)
    }

    pub fn flush(&mut self) -> EvalResult<()> {
        self.writer.flush()
    }
}
