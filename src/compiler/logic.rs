use crate::value::Value;

/// SQL three-valued truth
/// every boolean-producing expression goes through these helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    /// NULL maps to Unknown; non-boolean values never reach here after type checking
    pub fn from_value(value: &Value) -> Truth {
        match value {
            Value::Boolean(true) => Truth::True,
            Value::Boolean(false) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    pub fn from_bool(b: bool) -> Truth {
        if b { Truth::True } else { Truth::False }
    }

    pub fn into_value(self) -> Value {
        match self {
            Truth::True => Value::Boolean(true),
            Truth::False => Value::Boolean(false),
            Truth::Unknown => Value::Null,
        }
    }

    /// false dominates, then unknown
    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    /// true dominates, then unknown
    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    pub fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }

    /// WHERE semantics: only a definite true passes
    pub fn is_true(self) -> bool {
        self == Truth::True
    }
}
