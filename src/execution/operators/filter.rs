use crate::compiler::expression::CompiledExpression;
use crate::error::EvalResult;
use crate::value::Tuple;

/// physical operator for filtering rows based on a predicate
/// a row passes only when the predicate is TRUE; FALSE and NULL both drop it
#[derive(Clone)]
pub struct PhysicalFilter {
    predicate: CompiledExpression,
    label: String,
}

impl PhysicalFilter {
    pub fn new(predicate: CompiledExpression, label: String) -> Self {
        Self { predicate, label }
    }

    pub fn describe(&self) -> &str {
        &self.label
    }

    pub fn push(&mut self, tuple: Tuple, output: &mut Vec<Tuple>) -> EvalResult<()> {
        if self.predicate.evaluate_truth(&tuple)?.is_true() {
            output.push(tuple);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::expression::ExpressionCompiler;
    use crate::plan::{field, lit};
    use crate::registry::Registry;
    use crate::schema::{DataType, Schema};
    use crate::tuple;
    use crate::value::Value;

    #[test]
    fn test_null_predicate_drops_row() {
        let schema = Schema::of(&[("ID", DataType::Integer)]);
        let registry = Registry::new();
        let expr = field("ID").gt(lit(2));
        let predicate = ExpressionCompiler::new(&schema, &registry)
            .compile_predicate(&expr)
            .unwrap();
        let mut filter = PhysicalFilter::new(predicate, expr.to_string());

        let mut output = Vec::new();
        for row in [tuple![1], tuple![3], tuple![Value::Null], tuple![4]] {
            filter.push(row, &mut output).unwrap();
        }
        assert_eq!(output, vec![tuple![3], tuple![4]]);
    }
}
