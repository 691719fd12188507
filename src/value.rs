use crate::schema::DataType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;
use std::sync::Arc;

/// represents a single value flowing through a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Varchar(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// runtime type of the value, None for NULL
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Varchar(_) => Some(DataType::Varchar),
            Value::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// SQL ordering between two non-null values
    /// integers and floats compare numerically, other mixed kinds are incomparable
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
            (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
            (Value::Integer(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
            (Value::Float(l), Value::Integer(r)) => l.partial_cmp(&(*r as f64)),
            (Value::Boolean(l), Value::Boolean(r)) => Some(l.cmp(r)),
            (Value::Varchar(l), Value::Varchar(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Varchar(s) => f.write_str(s),
            Value::Null => f.write_str("NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// one immutable row, positionally aligned to a schema
/// cloning is cheap: buffered copies in join indices share the same storage
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    values: Arc<[Value]>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// all-null tuple used to pad the missing side of an outer join
    pub fn nulls(width: usize) -> Self {
        Self::new(vec![Value::Null; width])
    }

    /// left ++ right
    pub fn concat(left: &Tuple, right: &Tuple) -> Self {
        let mut values = Vec::with_capacity(left.len() + right.len());
        values.extend(left.values.iter().cloned());
        values.extend(right.values.iter().cloned());
        Self::new(values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.values.to_vec()
    }
}

impl Index<usize> for Tuple {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Tuple::new(values)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// build a tuple from heterogeneous literals: `tuple![1, "x", Value::Null]`
#[macro_export]
macro_rules! tuple {
    ($($value:expr),* $(,)?) => {
        $crate::value::Tuple::new(vec![$($crate::value::Value::from($value)),*])
    };
}

/// hashable key made of evaluated expression results
/// structural equality: NULL equals NULL, floats compare by bit pattern
#[derive(Debug, Clone)]
pub struct GroupKey(pub Vec<Value>);

impl GroupKey {
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

fn canonical_bits(f: f64) -> u64 {
    // fold -0.0 into 0.0 and every NaN into one pattern
    if f == 0.0 {
        0.0f64.to_bits()
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

fn key_value_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Float(l), Value::Float(r)) => canonical_bits(*l) == canonical_bits(*r),
        _ => left == right,
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(l, r)| key_value_eq(l, r))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            std::mem::discriminant(value).hash(state);
            match value {
                Value::Integer(i) => i.hash(state),
                Value::Float(f) => canonical_bits(*f).hash(state),
                Value::Boolean(b) => b.hash(state),
                Value::Varchar(s) => s.hash(state),
                Value::Null => {}
            }
        }
    }
}
