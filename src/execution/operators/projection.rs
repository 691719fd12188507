use crate::compiler::expression::CompiledExpression;
use crate::error::EvalResult;
use crate::value::{Tuple, Value};

/// physical operator for projecting columns
/// maps every input tuple to exactly one output tuple
#[derive(Clone)]
pub struct PhysicalProjection {
    expressions: Vec<CompiledExpression>,
}

impl PhysicalProjection {
    pub fn new(expressions: Vec<CompiledExpression>) -> Self {
        Self { expressions }
    }

    pub fn describe(&self) -> String {
        let names: Vec<&str> = self.expressions.iter().map(|e| e.name.as_str()).collect();
        names.join(", ")
    }

    pub fn push(&mut self, tuple: Tuple, output: &mut Vec<Tuple>) -> EvalResult<()> {
        let values = self
            .expressions
            .iter()
            .map(|expr| expr.evaluate(&tuple))
            .collect::<EvalResult<Vec<Value>>>()?;
        output.push(Tuple::new(values));
        Ok(())
    }
}
