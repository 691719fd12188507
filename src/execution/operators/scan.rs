use crate::error::{EvalResult, EvaluationError};
use crate::value::Tuple;

/// entry stage for one source; checks the tuple shape and passes it on unchanged
#[derive(Clone)]
pub struct PhysicalScan {
    source: String,
    width: usize,
}

impl PhysicalScan {
    pub fn new(source: String, width: usize) -> Self {
        Self { source, width }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn push(&mut self, tuple: Tuple, output: &mut Vec<Tuple>) -> EvalResult<()> {
        if tuple.len() != self.width {
            return Err(EvaluationError::TupleWidth {
                source_name: self.source.clone(),
                expected: self.width,
                actual: tuple.len(),
            });
        }
        output.push(tuple);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple;

    #[test]
    fn test_rejects_wrong_width() {
        let mut scan = PhysicalScan::new("FOO".to_string(), 2);
        let mut output = Vec::new();
        scan.push(tuple![1, "a"], &mut output).unwrap();
        assert_eq!(output.len(), 1);
        assert!(scan.push(tuple![1], &mut output).is_err());
    }
}
