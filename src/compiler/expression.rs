use super::logic::Truth;
use crate::error::{CompileError, CompileErrorKind, CompileResult, EvalResult, EvaluationError};
use crate::plan::{BinaryOperator, Expression, NamedExpression, UnaryOperator};
use crate::registry::{Registry, ReturnType};
use crate::schema::{DataType, Field, Schema};
use crate::value::{Tuple, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// per-tuple evaluator closed over literals and resolved field positions
pub type Evaluator = Arc<dyn Fn(&Tuple) -> EvalResult<Value> + Send + Sync>;

fn eval_fn<F>(f: F) -> Evaluator
where
    F: Fn(&Tuple) -> EvalResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// compiled scalar expression with its declared output type and name
#[derive(Clone)]
pub struct CompiledExpression {
    pub name: String,
    pub data_type: DataType,
    evaluator: Evaluator,
}

impl CompiledExpression {
    pub fn evaluate(&self, tuple: &Tuple) -> EvalResult<Value> {
        (self.evaluator)(tuple)
    }

    /// three-valued result of a boolean expression
    pub fn evaluate_truth(&self, tuple: &Tuple) -> EvalResult<Truth> {
        Ok(Truth::from_value(&self.evaluate(tuple)?))
    }

    pub fn field(&self) -> Field {
        Field::new(self.name.clone(), self.data_type)
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .finish()
    }
}

/// intermediate result: type is None only for an untyped NULL literal
struct Typed {
    data_type: Option<DataType>,
    evaluator: Evaluator,
}

/// compiles expression trees against a fixed input schema
pub struct ExpressionCompiler<'a> {
    schema: &'a Schema,
    registry: &'a Registry,
}

impl<'a> ExpressionCompiler<'a> {
    pub fn new(schema: &'a Schema, registry: &'a Registry) -> Self {
        Self { schema, registry }
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn compile(&self, expr: &Expression) -> CompileResult<CompiledExpression> {
        let name = self.default_name(expr, 0);
        self.finish(expr, name)
    }

    /// compile a projection entry; position feeds the `EXPR$n` fallback name
    pub fn compile_named(
        &self,
        named: &NamedExpression,
        position: usize,
    ) -> CompileResult<CompiledExpression> {
        let name = match &named.alias {
            Some(alias) => alias.clone(),
            None => self.default_name(&named.expr, position),
        };
        self.finish(&named.expr, name)
    }

    /// compile an expression that must yield BOOLEAN (or NULL)
    pub fn compile_predicate(&self, expr: &Expression) -> CompileResult<CompiledExpression> {
        let typed = self.compile_typed(expr)?;
        expect_boolean(&typed, "predicate")?;
        Ok(CompiledExpression {
            name: self.default_name(expr, 0),
            data_type: DataType::Boolean,
            evaluator: typed.evaluator,
        })
    }

    fn finish(&self, expr: &Expression, name: String) -> CompileResult<CompiledExpression> {
        let typed = self.compile_typed(expr)?;
        Ok(CompiledExpression {
            name,
            // a bare NULL has no type of its own
            data_type: typed.data_type.unwrap_or(DataType::Varchar),
            evaluator: typed.evaluator,
        })
    }

    fn default_name(&self, expr: &Expression, position: usize) -> String {
        match expr {
            Expression::Field(name) => match self.schema.index_of(name) {
                Some(idx) => self.schema.field(idx).name.clone(),
                None => name.clone(),
            },
            Expression::Column(idx) if *idx < self.schema.len() => {
                self.schema.field(*idx).name.clone()
            }
            _ => format!("EXPR${}", position),
        }
    }

    fn resolve(&self, name: &str) -> CompileResult<usize> {
        self.schema.index_of(name).ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::UnresolvedField,
                format!("field '{}' not found in {}", name, self.schema),
            )
        })
    }

    fn compile_typed(&self, expr: &Expression) -> CompileResult<Typed> {
        match expr {
            Expression::Literal(value) => {
                let value = value.clone();
                Ok(Typed {
                    data_type: value.data_type(),
                    evaluator: eval_fn(move |_| Ok(value.clone())),
                })
            }
            Expression::Field(name) => {
                let index = self.resolve(name)?;
                Ok(self.input_ref(index))
            }
            Expression::Column(index) => {
                if *index >= self.schema.len() {
                    return Err(CompileError::new(
                        CompileErrorKind::UnresolvedField,
                        format!("column ${} out of range for {}", index, self.schema),
                    ));
                }
                Ok(self.input_ref(*index))
            }
            Expression::Unary { op, expr } => self.compile_unary(*op, expr),
            Expression::Binary { op, left, right } => self.compile_binary(*op, left, right),
            Expression::Call { name, args } => self.compile_call(name, args),
            Expression::Cast { expr, to } => self.compile_cast(expr, *to),
        }
    }

    fn input_ref(&self, index: usize) -> Typed {
        Typed {
            data_type: Some(self.schema.field(index).data_type),
            evaluator: eval_fn(move |tuple| Ok(tuple.get(index).cloned().unwrap_or(Value::Null))),
        }
    }

    fn compile_unary(&self, op: UnaryOperator, expr: &Expression) -> CompileResult<Typed> {
        let inner = self.compile_typed(expr)?;
        let eval = inner.evaluator.clone();
        match op {
            UnaryOperator::Not => {
                expect_boolean(&inner, "NOT")?;
                Ok(Typed {
                    data_type: Some(DataType::Boolean),
                    evaluator: eval_fn(move |tuple| {
                        Ok(Truth::from_value(&eval(tuple)?).not().into_value())
                    }),
                })
            }
            UnaryOperator::Negate => {
                expect_numeric(&inner, "negation")?;
                Ok(Typed {
                    data_type: inner.data_type,
                    evaluator: eval_fn(move |tuple| match eval(tuple)? {
                        Value::Integer(i) => i
                            .checked_neg()
                            .map(Value::Integer)
                            .ok_or(EvaluationError::Overflow("negation")),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        _ => Ok(Value::Null),
                    }),
                })
            }
            UnaryOperator::IsNull => Ok(Typed {
                data_type: Some(DataType::Boolean),
                evaluator: eval_fn(move |tuple| Ok(Value::Boolean(eval(tuple)?.is_null()))),
            }),
            UnaryOperator::IsNotNull => Ok(Typed {
                data_type: Some(DataType::Boolean),
                evaluator: eval_fn(move |tuple| Ok(Value::Boolean(!eval(tuple)?.is_null()))),
            }),
        }
    }

    fn compile_binary(
        &self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
    ) -> CompileResult<Typed> {
        let left = self.compile_typed(left)?;
        let right = self.compile_typed(right)?;
        let (l, r) = (left.evaluator.clone(), right.evaluator.clone());

        match op {
            BinaryOperator::And | BinaryOperator::Or => {
                expect_boolean(&left, op.symbol())?;
                expect_boolean(&right, op.symbol())?;
                let evaluator: Evaluator = if op == BinaryOperator::And {
                    eval_fn(move |tuple| {
                        let lhs = Truth::from_value(&l(tuple)?);
                        if lhs == Truth::False {
                            return Ok(Value::Boolean(false));
                        }
                        Ok(lhs.and(Truth::from_value(&r(tuple)?)).into_value())
                    })
                } else {
                    eval_fn(move |tuple| {
                        let lhs = Truth::from_value(&l(tuple)?);
                        if lhs == Truth::True {
                            return Ok(Value::Boolean(true));
                        }
                        Ok(lhs.or(Truth::from_value(&r(tuple)?)).into_value())
                    })
                };
                Ok(Typed {
                    data_type: Some(DataType::Boolean),
                    evaluator,
                })
            }
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => {
                expect_comparable(&left, &right, op)?;
                Ok(Typed {
                    data_type: Some(DataType::Boolean),
                    evaluator: eval_fn(move |tuple| {
                        let (lhs, rhs) = (l(tuple)?, r(tuple)?);
                        Ok(compare(op, &lhs, &rhs).into_value())
                    }),
                })
            }
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo => {
                expect_numeric(&left, op.symbol())?;
                expect_numeric(&right, op.symbol())?;
                let data_type = match (left.data_type, right.data_type) {
                    (Some(DataType::Float), _) | (_, Some(DataType::Float)) => Some(DataType::Float),
                    (None, None) => None,
                    _ => Some(DataType::Integer),
                };
                Ok(Typed {
                    data_type,
                    evaluator: eval_fn(move |tuple| {
                        let (lhs, rhs) = (l(tuple)?, r(tuple)?);
                        arithmetic(op, &lhs, &rhs)
                    }),
                })
            }
        }
    }

    fn compile_call(&self, name: &str, args: &[Expression]) -> CompileResult<Typed> {
        let function = match self.registry.function(name) {
            Some(function) => function.clone(),
            None if self.registry.aggregate(name).is_some() => {
                return Err(CompileError::new(
                    CompileErrorKind::UnknownFunction,
                    format!("aggregate function {} used in scalar context", name),
                ));
            }
            None => {
                return Err(CompileError::new(
                    CompileErrorKind::UnknownFunction,
                    format!("no function named {}", name),
                ));
            }
        };
        if function.arity != args.len() {
            return Err(CompileError::new(
                CompileErrorKind::ArityMismatch,
                format!(
                    "{} takes {} argument(s), got {}",
                    function.name,
                    function.arity,
                    args.len()
                ),
            ));
        }

        let compiled: Vec<Typed> = args
            .iter()
            .map(|arg| self.compile_typed(arg))
            .collect::<CompileResult<_>>()?;
        let data_type = match function.return_type {
            ReturnType::Fixed(t) => Some(t),
            ReturnType::SameAsFirstArg => compiled.first().and_then(|a| a.data_type),
        };
        let evaluators: Vec<Evaluator> = compiled.into_iter().map(|a| a.evaluator).collect();
        let callable = function.callable.clone();
        let strict = function.null_strict;
        let function_name = function.name.clone();

        Ok(Typed {
            data_type,
            evaluator: eval_fn(move |tuple| {
                let values = evaluators
                    .iter()
                    .map(|eval| eval(tuple))
                    .collect::<EvalResult<Vec<Value>>>()?;
                if strict && values.iter().any(Value::is_null) {
                    return Ok(Value::Null);
                }
                let result = callable(&values)?;
                // the declared type is what downstream schemas were built from
                match (data_type, result.data_type()) {
                    (Some(declared), Some(actual)) if declared != actual => {
                        Err(EvaluationError::function(
                            &function_name,
                            format!("returned {} but is declared {}", actual, declared),
                        ))
                    }
                    _ => Ok(result),
                }
            }),
        })
    }

    fn compile_cast(&self, expr: &Expression, to: DataType) -> CompileResult<Typed> {
        let inner = self.compile_typed(expr)?;
        let from = inner.data_type;
        let allowed = match (from, to) {
            (None, _) => true,
            (Some(from), to) if from == to => true,
            (Some(_), DataType::Varchar) => true,
            (Some(DataType::Varchar), _) => true,
            (Some(from), to) => from.is_numeric() && to.is_numeric(),
        };
        if !allowed {
            return Err(CompileError::new(
                CompileErrorKind::TypeMismatch,
                format!("cannot cast {} to {}", type_name(from), to),
            ));
        }
        let eval = inner.evaluator;
        Ok(Typed {
            data_type: Some(to),
            evaluator: eval_fn(move |tuple| cast(eval(tuple)?, to)),
        })
    }
}

fn type_name(data_type: Option<DataType>) -> String {
    data_type.map_or("NULL".to_string(), |t| t.to_string())
}

fn expect_boolean(typed: &Typed, context: &str) -> CompileResult<()> {
    match typed.data_type {
        None | Some(DataType::Boolean) => Ok(()),
        Some(other) => Err(CompileError::new(
            CompileErrorKind::TypeMismatch,
            format!("{} expects BOOLEAN, got {}", context, other),
        )),
    }
}

fn expect_numeric(typed: &Typed, context: &str) -> CompileResult<()> {
    match typed.data_type {
        None => Ok(()),
        Some(t) if t.is_numeric() => Ok(()),
        Some(other) => Err(CompileError::new(
            CompileErrorKind::TypeMismatch,
            format!("{} expects a numeric operand, got {}", context, other),
        )),
    }
}

fn expect_comparable(left: &Typed, right: &Typed, op: BinaryOperator) -> CompileResult<()> {
    let ok = match (left.data_type, right.data_type) {
        (None, _) | (_, None) => true,
        (Some(l), Some(r)) => l == r || (l.is_numeric() && r.is_numeric()),
    };
    if ok {
        Ok(())
    } else {
        Err(CompileError::new(
            CompileErrorKind::TypeMismatch,
            format!(
                "cannot compare {} {} {}",
                type_name(left.data_type),
                op.symbol(),
                type_name(right.data_type)
            ),
        ))
    }
}

/// comparison with NULL propagation: any NULL operand yields Unknown
fn compare(op: BinaryOperator, left: &Value, right: &Value) -> Truth {
    if left.is_null() || right.is_null() {
        return Truth::Unknown;
    }
    let Some(ordering) = left.compare(right) else {
        return Truth::Unknown;
    };
    Truth::from_bool(match op {
        BinaryOperator::Equal => ordering == Ordering::Equal,
        BinaryOperator::NotEqual => ordering != Ordering::Equal,
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
        _ => false,
    })
}

/// numeric arithmetic with NULL propagation and checked integer math
pub(crate) fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(l), Value::Integer(r)) => {
            let (l, r) = (*l, *r);
            let result = match op {
                BinaryOperator::Add => l.checked_add(r),
                BinaryOperator::Subtract => l.checked_sub(r),
                BinaryOperator::Multiply => l.checked_mul(r),
                BinaryOperator::Divide => {
                    if r == 0 {
                        return Err(EvaluationError::DivisionByZero);
                    }
                    l.checked_div(r)
                }
                BinaryOperator::Modulo => {
                    if r == 0 {
                        return Err(EvaluationError::DivisionByZero);
                    }
                    l.checked_rem(r)
                }
                _ => return Ok(Value::Null),
            };
            result
                .map(Value::Integer)
                .ok_or(EvaluationError::Overflow(op.symbol()))
        }
        (l, r) => {
            let (Some(l), Some(r)) = (l.as_f64(), r.as_f64()) else {
                return Ok(Value::Null);
            };
            let result = match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Subtract => l - r,
                BinaryOperator::Multiply => l * r,
                BinaryOperator::Divide | BinaryOperator::Modulo if r == 0.0 => {
                    return Err(EvaluationError::DivisionByZero);
                }
                BinaryOperator::Divide => l / r,
                BinaryOperator::Modulo => l % r,
                _ => return Ok(Value::Null),
            };
            Ok(Value::Float(result))
        }
    }
}

pub(crate) fn cast(value: Value, to: DataType) -> EvalResult<Value> {
    let failed = |v: &Value| EvaluationError::function("CAST", format!("cannot cast '{}' to {}", v, to));
    Ok(match (value, to) {
        (Value::Null, _) => Value::Null,
        (Value::Integer(i), DataType::Float) => Value::Float(i as f64),
        (Value::Float(f), DataType::Integer) => Value::Integer(f.trunc() as i64),
        (Value::Varchar(s), DataType::Integer) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| failed(&Value::Varchar(s.clone())))?,
        (Value::Varchar(s), DataType::Float) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| failed(&Value::Varchar(s.clone())))?,
        (Value::Varchar(s), DataType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => return Err(failed(&Value::Varchar(s))),
        },
        (v, DataType::Varchar) => Value::Varchar(v.to_string()),
        (v, _) => v,
    })
}
