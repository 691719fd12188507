use super::expression::{CompiledExpression, ExpressionCompiler};
use crate::error::{CompileError, CompileErrorKind, CompileResult, EvalResult, EvaluationError};
use crate::plan::{AggregateCall, BinaryOperator, NamedExpression};
use crate::registry::{AccumulatorFactory, Registry};
use crate::schema::{DataType, Field, Schema};
use crate::value::{GroupKey, Tuple, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// per-group state of one aggregate call
/// initialization is the factory that creates it, so a new accumulator is always neutral
pub trait Accumulator: Send {
    /// fold one input row's argument values into the state
    fn merge(&mut self, args: &[Value]) -> EvalResult<()>;

    /// produce the output value; the state stays usable
    fn finalize(&self) -> EvalResult<Value>;
}

#[derive(Default)]
struct CountStar {
    count: i64,
}

impl Accumulator for CountStar {
    fn merge(&mut self, _args: &[Value]) -> EvalResult<()> {
        self.count += 1;
        Ok(())
    }

    fn finalize(&self) -> EvalResult<Value> {
        Ok(Value::Integer(self.count))
    }
}

/// COUNT(expr): rows where expr is not NULL
#[derive(Default)]
struct Count {
    count: i64,
}

impl Accumulator for Count {
    fn merge(&mut self, args: &[Value]) -> EvalResult<()> {
        if args.iter().all(|v| !v.is_null()) {
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(&self) -> EvalResult<Value> {
        Ok(Value::Integer(self.count))
    }
}

/// running sum; NULL until the first non-null input
#[derive(Default)]
struct Sum {
    sum: Option<Value>,
}

impl Sum {
    fn add(&mut self, value: &Value) -> EvalResult<()> {
        if value.is_null() {
            return Ok(());
        }
        self.sum = Some(match self.sum.take() {
            None => value.clone(),
            Some(current) => super::expression::arithmetic(BinaryOperator::Add, &current, value)?,
        });
        Ok(())
    }
}

impl Accumulator for Sum {
    fn merge(&mut self, args: &[Value]) -> EvalResult<()> {
        self.add(&args[0])
    }

    fn finalize(&self) -> EvalResult<Value> {
        Ok(self.sum.clone().unwrap_or(Value::Null))
    }
}

/// SUM / count of non-null inputs, integer inputs keep integer division
#[derive(Default)]
struct Avg {
    sum: Sum,
    count: i64,
}

impl Accumulator for Avg {
    fn merge(&mut self, args: &[Value]) -> EvalResult<()> {
        if !args[0].is_null() {
            self.sum.add(&args[0])?;
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(&self) -> EvalResult<Value> {
        match &self.sum.sum {
            None => Ok(Value::Null),
            Some(Value::Integer(sum)) => Ok(Value::Integer(sum / self.count)),
            Some(Value::Float(sum)) => Ok(Value::Float(sum / self.count as f64)),
            Some(other) => Err(EvaluationError::function("AVG", format!("not numeric: {}", other))),
        }
    }
}

/// MIN or MAX depending on the ordering that replaces the current value
struct Extreme {
    current: Option<Value>,
    replace_when: Ordering,
}

impl Accumulator for Extreme {
    fn merge(&mut self, args: &[Value]) -> EvalResult<()> {
        let value = &args[0];
        if value.is_null() {
            return Ok(());
        }
        let replace = match &self.current {
            None => true,
            Some(current) => value.compare(current) == Some(self.replace_when),
        };
        if replace {
            self.current = Some(value.clone());
        }
        Ok(())
    }

    fn finalize(&self) -> EvalResult<Value> {
        Ok(self.current.clone().unwrap_or(Value::Null))
    }
}

/// one compiled aggregate call: argument evaluators plus accumulator factory
#[derive(Clone)]
pub struct CompiledAggregateCall {
    pub name: String,
    pub function: String,
    pub data_type: DataType,
    pub args: Vec<CompiledExpression>,
    factory: AccumulatorFactory,
}

impl CompiledAggregateCall {
    pub fn create_accumulator(&self) -> Box<dyn Accumulator> {
        (self.factory)()
    }

    /// evaluate the call's arguments against one input row
    pub fn arguments(&self, tuple: &Tuple) -> EvalResult<Vec<Value>> {
        self.args.iter().map(|arg| arg.evaluate(tuple)).collect()
    }
}

/// everything the aggregate operator needs
#[derive(Clone)]
pub struct CompiledAggregate {
    pub group_by: Vec<CompiledExpression>,
    pub calls: Vec<CompiledAggregateCall>,
    /// group fields followed by aggregate fields
    pub aggregate_schema: Schema,
    /// expressions evaluated over an assembled aggregate row, identity unless a projection was fused
    pub output: Vec<CompiledExpression>,
    pub output_schema: Schema,
}

impl CompiledAggregate {
    pub fn group_key(&self, tuple: &Tuple) -> EvalResult<GroupKey> {
        let values = self
            .group_by
            .iter()
            .map(|expr| expr.evaluate(tuple))
            .collect::<EvalResult<Vec<Value>>>()?;
        Ok(GroupKey(values))
    }

    /// evaluate the post-aggregation list over (group key ++ finalized values)
    pub fn project(&self, row: &Tuple) -> EvalResult<Tuple> {
        let values = self
            .output
            .iter()
            .map(|expr| expr.evaluate(row))
            .collect::<EvalResult<Vec<Value>>>()?;
        Ok(Tuple::new(values))
    }
}

impl fmt::Debug for CompiledAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let calls: Vec<&str> = self.calls.iter().map(|c| c.name.as_str()).collect();
        f.debug_struct("CompiledAggregate")
            .field("group_by", &self.group_by)
            .field("calls", &calls)
            .field("output_schema", &self.output_schema)
            .finish()
    }
}

/// compiles group-by lists and aggregate calls against the child schema
pub struct AggregateCompiler<'a> {
    input: ExpressionCompiler<'a>,
    registry: &'a Registry,
}

impl<'a> AggregateCompiler<'a> {
    pub fn new(input_schema: &'a Schema, registry: &'a Registry) -> Self {
        Self {
            input: ExpressionCompiler::new(input_schema, registry),
            registry,
        }
    }

    pub fn compile(
        &self,
        group_by: &[NamedExpression],
        calls: &[AggregateCall],
    ) -> CompileResult<CompiledAggregate> {
        let group_by = group_by
            .iter()
            .enumerate()
            .map(|(i, named)| self.input.compile_named(named, i))
            .collect::<CompileResult<Vec<_>>>()?;

        let calls = calls
            .iter()
            .enumerate()
            .map(|(i, call)| self.compile_call(call, group_by.len() + i))
            .collect::<CompileResult<Vec<_>>>()?;

        let mut fields: Vec<Field> = group_by.iter().map(CompiledExpression::field).collect();
        fields.extend(calls.iter().map(|c| Field::new(c.name.clone(), c.data_type)));
        let aggregate_schema = Schema::deduplicated(fields);

        let output = identity(&aggregate_schema, self.registry)?;
        Ok(CompiledAggregate {
            group_by,
            calls,
            output_schema: aggregate_schema.clone(),
            aggregate_schema,
            output,
        })
    }

    fn compile_call(&self, call: &AggregateCall, position: usize) -> CompileResult<CompiledAggregateCall> {
        let name = call
            .alias
            .clone()
            .unwrap_or_else(|| format!("EXPR${}", position));
        let args = call
            .args
            .iter()
            .map(|arg| self.input.compile(arg))
            .collect::<CompileResult<Vec<_>>>()?;
        let function = call.function.to_uppercase();

        let (data_type, factory): (DataType, AccumulatorFactory) = match function.as_str() {
            "COUNT" if args.is_empty() => (DataType::Integer, factory_of::<CountStar>()),
            "COUNT" => (DataType::Integer, factory_of::<Count>()),
            "SUM" | "AVG" => {
                expect_arity(&function, &args, 1)?;
                let data_type = args[0].data_type;
                if !data_type.is_numeric() {
                    return Err(CompileError::new(
                        CompileErrorKind::TypeMismatch,
                        format!("{} expects a numeric argument, got {}", function, data_type),
                    ));
                }
                let factory = if function == "SUM" {
                    factory_of::<Sum>()
                } else {
                    factory_of::<Avg>()
                };
                (data_type, factory)
            }
            "MIN" | "MAX" => {
                expect_arity(&function, &args, 1)?;
                let replace_when = if function == "MIN" {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                (args[0].data_type, extreme_factory(replace_when))
            }
            _ => match self.registry.aggregate(&function) {
                Some(udaf) => {
                    expect_arity(&function, &args, udaf.arity)?;
                    (udaf.return_type, udaf.factory.clone())
                }
                None => {
                    let reason = if self.registry.function(&function).is_some() {
                        format!("{} is a scalar function, not an aggregate", function)
                    } else {
                        format!("no aggregate function named {}", function)
                    };
                    return Err(CompileError::new(CompileErrorKind::UnknownFunction, reason));
                }
            },
        };

        if function == "COUNT" && args.len() > 1 {
            return Err(CompileError::new(
                CompileErrorKind::ArityMismatch,
                format!("COUNT takes at most 1 argument, got {}", args.len()),
            ));
        }

        Ok(CompiledAggregateCall {
            name,
            function,
            data_type,
            args,
            factory,
        })
    }
}

/// fuse a projection over the aggregate output into the aggregate itself
/// expressions may only reference group and aggregate output fields
pub fn fuse_projection(
    aggregate: &mut CompiledAggregate,
    exprs: &[NamedExpression],
    registry: &Registry,
) -> CompileResult<()> {
    let compiler = ExpressionCompiler::new(&aggregate.aggregate_schema, registry);
    let output = exprs
        .iter()
        .enumerate()
        .map(|(i, named)| compiler.compile_named(named, i))
        .collect::<CompileResult<Vec<_>>>()?;
    let output_schema = Schema::deduplicated(output.iter().map(CompiledExpression::field).collect());
    aggregate.output = output;
    aggregate.output_schema = output_schema;
    Ok(())
}

fn factory_of<A: Accumulator + Default + 'static>() -> AccumulatorFactory {
    Arc::new(|| Box::new(A::default()) as Box<dyn Accumulator>)
}

fn extreme_factory(replace_when: Ordering) -> AccumulatorFactory {
    Arc::new(move || {
        Box::new(Extreme {
            current: None,
            replace_when,
        }) as Box<dyn Accumulator>
    })
}

fn identity(schema: &Schema, registry: &Registry) -> CompileResult<Vec<CompiledExpression>> {
    let compiler = ExpressionCompiler::new(schema, registry);
    (0..schema.len())
        .map(|i| compiler.compile(&crate::plan::column(i)))
        .collect()
}

fn expect_arity(function: &str, args: &[CompiledExpression], arity: usize) -> CompileResult<()> {
    if args.len() == arity {
        Ok(())
    } else {
        Err(CompileError::new(
            CompileErrorKind::ArityMismatch,
            format!("{} takes {} argument(s), got {}", function, arity, args.len()),
        ))
    }
}
