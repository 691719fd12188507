use super::Side;
use crate::compiler::expression::CompiledExpression;
use crate::error::EvalResult;
use crate::plan::JoinType;
use crate::value::{GroupKey, Tuple, Value};
use std::collections::HashMap;
use tracing::trace;

/// a tuple seen on one side during the current window
struct Buffered {
    tuple: Tuple,
    matched: bool,
}

/// arena of buffered tuples plus a key -> arena positions index
#[derive(Default)]
struct JoinBuffer {
    rows: Vec<Buffered>,
    index: HashMap<GroupKey, Vec<usize>>,
}

impl JoinBuffer {
    fn clear(&mut self) {
        self.rows.clear();
        self.index.clear();
    }
}

/// symmetric streaming equi-join over two inputs
/// every arrival probes the opposite buffer; outer sides are swept when the window closes
pub struct PhysicalJoin {
    join_type: JoinType,
    left_keys: Vec<CompiledExpression>,
    right_keys: Vec<CompiledExpression>,
    left_width: usize,
    right_width: usize,
    left: JoinBuffer,
    right: JoinBuffer,
}

impl PhysicalJoin {
    pub fn new(
        join_type: JoinType,
        left_keys: Vec<CompiledExpression>,
        right_keys: Vec<CompiledExpression>,
        left_width: usize,
        right_width: usize,
    ) -> Self {
        Self {
            join_type,
            left_keys,
            right_keys,
            left_width,
            right_width,
            left: JoinBuffer::default(),
            right: JoinBuffer::default(),
        }
    }

    pub fn fresh(&self) -> Self {
        Self::new(
            self.join_type,
            self.left_keys.clone(),
            self.right_keys.clone(),
            self.left_width,
            self.right_width,
        )
    }

    pub fn describe(&self) -> String {
        let pairs: Vec<String> = self
            .left_keys
            .iter()
            .zip(self.right_keys.iter())
            .map(|(l, r)| format!("{} = {}", l.name, r.name))
            .collect();
        format!("{} ON {}", self.join_type, pairs.join(" AND "))
    }

    /// number of tuples currently buffered on each side
    pub fn buffered(&self) -> (usize, usize) {
        (self.left.rows.len(), self.right.rows.len())
    }

    fn key(keys: &[CompiledExpression], tuple: &Tuple) -> EvalResult<GroupKey> {
        let values = keys
            .iter()
            .map(|k| k.evaluate(tuple))
            .collect::<EvalResult<Vec<Value>>>()?;
        Ok(GroupKey(values))
    }

    pub fn push(&mut self, side: Side, tuple: Tuple, output: &mut Vec<Tuple>) -> EvalResult<()> {
        let (keys, own, other) = match side {
            Side::Left => (&self.left_keys, &mut self.left, &mut self.right),
            Side::Right => (&self.right_keys, &mut self.right, &mut self.left),
        };
        let key = Self::key(keys, &tuple)?;
        let position = own.rows.len();
        own.rows.push(Buffered {
            tuple,
            matched: false,
        });

        // null keys are kept for the outer sweep but never indexed or probed
        if key.has_null() {
            trace!(?side, "join key contains null, buffered without probing");
            return Ok(());
        }

        if let Some(matches) = other.index.get(&key) {
            for &other_pos in matches {
                let partner = &mut other.rows[other_pos];
                partner.matched = true;
                let joined = match side {
                    Side::Left => Tuple::concat(&own.rows[position].tuple, &partner.tuple),
                    Side::Right => Tuple::concat(&partner.tuple, &own.rows[position].tuple),
                };
                output.push(joined);
            }
            if !matches.is_empty() {
                own.rows[position].matched = true;
            }
        }
        own.index.entry(key).or_default().push(position);
        Ok(())
    }

    /// emit unmatched rows for outer modes, then reset both buffers for the next window
    pub fn flush(&mut self, output: &mut Vec<Tuple>) -> EvalResult<()> {
        if self.join_type.keeps_left() {
            let padding = Tuple::nulls(self.right_width);
            for row in self.left.rows.iter().filter(|r| !r.matched) {
                output.push(Tuple::concat(&row.tuple, &padding));
            }
        }
        if self.join_type.keeps_right() {
            let padding = Tuple::nulls(self.left_width);
            for row in self.right.rows.iter().filter(|r| !r.matched) {
                output.push(Tuple::concat(&padding, &row.tuple));
            }
        }
        trace!(
            left = self.left.rows.len(),
            right = self.right.rows.len(),
            "join window closed"
        );
        self.reset();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::expression::ExpressionCompiler;
    use crate::plan::column;
    use crate::registry::Registry;
    use crate::schema::{DataType, Schema};
    use crate::tuple;

    fn join(join_type: JoinType) -> PhysicalJoin {
        let schema = Schema::of(&[("K", DataType::Integer), ("V", DataType::Varchar)]);
        let registry = Registry::new();
        let compiler = ExpressionCompiler::new(&schema, &registry);
        let key = compiler.compile(&column(0)).unwrap();
        PhysicalJoin::new(join_type, vec![key.clone()], vec![key], 2, 2)
    }

    fn feed(join: &mut PhysicalJoin) -> Vec<Tuple> {
        let mut output = Vec::new();
        join.push(Side::Left, tuple![1, "l1"], &mut output).unwrap();
        join.push(Side::Left, tuple![1, "l2"], &mut output).unwrap();
        join.push(Side::Left, tuple![2, "l3"], &mut output).unwrap();
        join.push(Side::Left, tuple![Value::Null, "l4"], &mut output).unwrap();
        join.push(Side::Right, tuple![1, "r1"], &mut output).unwrap();
        join.push(Side::Right, tuple![1, "r2"], &mut output).unwrap();
        join.push(Side::Right, tuple![3, "r3"], &mut output).unwrap();
        join.push(Side::Right, tuple![Value::Null, "r4"], &mut output).unwrap();
        join.flush(&mut output).unwrap();
        output
    }

    #[test]
    fn test_inner_cross_product_per_key() {
        let output = feed(&mut join(JoinType::Inner));
        assert_eq!(output.len(), 4);
        assert!(output.contains(&tuple![1, "l1", 1, "r1"]));
        assert!(output.contains(&tuple![1, "l2", 1, "r2"]));
    }

    #[test]
    fn test_left_pads_right_side() {
        let output = feed(&mut join(JoinType::Left));
        assert_eq!(output.len(), 6);
        assert!(output.contains(&tuple![2, "l3", Value::Null, Value::Null]));
        assert!(output.contains(&tuple![Value::Null, "l4", Value::Null, Value::Null]));
    }

    #[test]
    fn test_right_pads_left_side() {
        let output = feed(&mut join(JoinType::Right));
        assert_eq!(output.len(), 6);
        assert!(output.contains(&tuple![Value::Null, Value::Null, 3, "r3"]));
        assert!(output.contains(&tuple![Value::Null, Value::Null, Value::Null, "r4"]));
    }

    #[test]
    fn test_full_sweeps_both_sides() {
        let output = feed(&mut join(JoinType::Full));
        assert_eq!(output.len(), 8);
    }

    #[test]
    fn test_flush_clears_window() {
        let mut join = join(JoinType::Inner);
        feed(&mut join);
        assert_eq!(join.buffered(), (0, 0));
    }
}
