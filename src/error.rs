use std::fmt;

/// what went wrong while compiling a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    UnresolvedField,
    ArityMismatch,
    UnknownFunction,
    UnknownSource,
    UnknownSink,
    SchemaMismatch,
    TypeMismatch,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileErrorKind::UnresolvedField => f.write_str("unresolved field"),
            CompileErrorKind::ArityMismatch => f.write_str("arity mismatch"),
            CompileErrorKind::UnknownFunction => f.write_str("unknown function"),
            CompileErrorKind::UnknownSource => f.write_str("unknown source"),
            CompileErrorKind::UnknownSink => f.write_str("unknown sink"),
            CompileErrorKind::SchemaMismatch => f.write_str("schema mismatch"),
            CompileErrorKind::TypeMismatch => f.write_str("type mismatch"),
        }
    }
}

/// fatal compile-time failure, always reported with the relational node it came from
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} in {node}: {reason}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub node: String,
    pub reason: String,
}

impl CompileError {
    /// error raised below the plan level; the plan compiler fills in the node
    pub fn new(kind: CompileErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            node: String::new(),
            reason: reason.into(),
        }
    }

    /// attach the failing node unless a deeper node already claimed the error
    pub fn at(mut self, node: impl Into<String>) -> Self {
        if self.node.is_empty() {
            self.node = node.into();
        }
        self
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// failure while a compiled pipeline is running
/// propagated to the caller of consume/flush, never swallowed by a stage
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    #[error("function {name} failed: {message}")]
    Function { name: String, message: String },

    #[error("pipeline does not read from source '{0}'")]
    UnknownSource(String),

    #[error("tuple has {actual} values but source '{source_name}' declares {expected}")]
    TupleWidth {
        source_name: String,
        expected: usize,
        actual: usize,
    },

    #[error("source '{0}' has no reader attached")]
    MissingReader(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl EvaluationError {
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        EvaluationError::Function {
            name: name.into(),
            message: message.into(),
        }
    }
}

pub type EvalResult<T> = Result<T, EvaluationError>;
