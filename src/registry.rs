use crate::compiler::aggregate::Accumulator;
use crate::error::{EvalResult, EvaluationError};
use crate::io::{MemorySource, SinkWriter, SourceReader};
use crate::schema::{DataType, Schema};
use crate::value::{Tuple, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// opens a fresh reader over a source, once per executor run
pub type ReaderFactory = Arc<dyn Fn() -> EvalResult<Box<dyn SourceReader>> + Send + Sync>;

/// scalar callable, arguments arrive positionally
pub type ScalarFn = Arc<dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync>;

/// creates an accumulator in its neutral initial state
pub type AccumulatorFactory = Arc<dyn Fn() -> Box<dyn Accumulator> + Send + Sync>;

#[derive(Clone)]
pub struct SourceDef {
    pub name: String,
    pub schema: Schema,
    pub reader: Option<ReaderFactory>,
}

#[derive(Clone)]
pub struct SinkDef {
    pub name: String,
    pub schema: Schema,
    pub writer: Arc<dyn SinkWriter>,
}

/// output type of a scalar function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Fixed(DataType),
    /// polymorphic built-ins such as ABS
    SameAsFirstArg,
}

#[derive(Clone)]
pub struct ScalarFunction {
    pub name: String,
    pub arity: usize,
    pub return_type: ReturnType,
    /// NULL in any argument short-circuits to NULL without calling
    pub null_strict: bool,
    pub callable: ScalarFn,
}

#[derive(Clone)]
pub struct AggregateFunction {
    pub name: String,
    pub arity: usize,
    pub return_type: DataType,
    pub factory: AccumulatorFactory,
}

/// name -> definition lookup for everything a plan may reference
/// function names are case-insensitive, source and sink names are exact
#[derive(Clone, Default)]
pub struct Registry {
    sources: HashMap<String, SourceDef>,
    sinks: HashMap<String, SinkDef>,
    functions: HashMap<String, ScalarFunction>,
    aggregates: HashMap<String, AggregateFunction>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// registry preloaded with ABS, UPPER, LOWER and CHAR_LENGTH
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtin("ABS", ReturnType::SameAsFirstArg, |args| {
            Ok(match &args[0] {
                Value::Integer(i) => Value::Integer(
                    i.checked_abs().ok_or(EvaluationError::Overflow("ABS"))?,
                ),
                Value::Float(f) => Value::Float(f.abs()),
                other => return Err(EvaluationError::function("ABS", format!("not numeric: {}", other))),
            })
        });
        registry.register_builtin("UPPER", ReturnType::Fixed(DataType::Varchar), |args| {
            Ok(Value::Varchar(args[0].to_string().to_uppercase()))
        });
        registry.register_builtin("LOWER", ReturnType::Fixed(DataType::Varchar), |args| {
            Ok(Value::Varchar(args[0].to_string().to_lowercase()))
        });
        registry.register_builtin("CHAR_LENGTH", ReturnType::Fixed(DataType::Integer), |args| {
            Ok(Value::Integer(args[0].to_string().chars().count() as i64))
        });
        registry
    }

    fn register_builtin<F>(&mut self, name: &str, return_type: ReturnType, f: F)
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.to_string(),
            ScalarFunction {
                name: name.to_string(),
                arity: 1,
                return_type,
                null_strict: true,
                callable: Arc::new(f),
            },
        );
    }

    /// declare a source by schema only; tuples are pushed by the caller
    pub fn register_source(&mut self, name: &str, schema: Schema) -> &mut Self {
        self.sources.insert(
            name.to_string(),
            SourceDef {
                name: name.to_string(),
                schema,
                reader: None,
            },
        );
        self
    }

    pub fn register_source_with_reader(
        &mut self,
        name: &str,
        schema: Schema,
        reader: ReaderFactory,
    ) -> &mut Self {
        self.sources.insert(
            name.to_string(),
            SourceDef {
                name: name.to_string(),
                schema,
                reader: Some(reader),
            },
        );
        self
    }

    /// source backed by a fixed tuple list, replayed on every run
    pub fn register_memory_source(&mut self, name: &str, schema: Schema, tuples: Vec<Tuple>) -> &mut Self {
        let tuples = Arc::new(tuples);
        let factory: ReaderFactory = Arc::new(move || {
            Ok(Box::new(MemorySource::new(tuples.as_ref().clone())) as Box<dyn SourceReader>)
        });
        self.register_source_with_reader(name, schema, factory)
    }

    pub fn register_sink(&mut self, name: &str, schema: Schema, writer: Arc<dyn SinkWriter>) -> &mut Self {
        self.sinks.insert(
            name.to_string(),
            SinkDef {
                name: name.to_string(),
                schema,
                writer,
            },
        );
        self
    }

    /// register a scalar UDF; it sees NULL arguments as-is
    pub fn register_function<F>(&mut self, name: &str, arity: usize, return_type: DataType, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        let key = name.to_uppercase();
        self.functions.insert(
            key.clone(),
            ScalarFunction {
                name: key,
                arity,
                return_type: ReturnType::Fixed(return_type),
                null_strict: false,
                callable: Arc::new(f),
            },
        );
        self
    }

    /// register a UDAF; the factory must hand out accumulators in their neutral state
    pub fn register_aggregate<F>(&mut self, name: &str, arity: usize, return_type: DataType, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Accumulator> + Send + Sync + 'static,
    {
        let key = name.to_uppercase();
        self.aggregates.insert(
            key.clone(),
            AggregateFunction {
                name: key,
                arity,
                return_type,
                factory: Arc::new(factory),
            },
        );
        self
    }

    pub fn source(&self, name: &str) -> Option<&SourceDef> {
        self.sources.get(name)
    }

    pub fn sink(&self, name: &str) -> Option<&SinkDef> {
        self.sinks.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&ScalarFunction> {
        self.functions.get(&name.to_uppercase())
    }

    pub fn aggregate(&self, name: &str) -> Option<&AggregateFunction> {
        self.aggregates.get(&name.to_uppercase())
    }

    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn sink_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sinks.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("sources", &self.source_names())
            .field("sinks", &self.sink_names())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("aggregates", &self.aggregates.keys().collect::<Vec<_>>())
            .finish()
    }
}
