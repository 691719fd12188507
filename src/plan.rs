use crate::schema::DataType;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// relational operator tree handed over by the upstream parser/optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelNode {
    Scan {
        source: String,
    },
    Filter {
        predicate: Expression,
        input: Box<RelNode>,
    },
    Project {
        exprs: Vec<NamedExpression>,
        input: Box<RelNode>,
    },
    Join {
        left: Box<RelNode>,
        right: Box<RelNode>,
        left_keys: Vec<Expression>,
        right_keys: Vec<Expression>,
        #[serde(default)]
        join_type: JoinType,
    },
    Aggregate {
        group_by: Vec<NamedExpression>,
        calls: Vec<AggregateCall>,
        input: Box<RelNode>,
    },
    Sink {
        target: String,
        input: Box<RelNode>,
    },
}

impl RelNode {
    pub fn scan(source: impl Into<String>) -> Self {
        RelNode::Scan {
            source: source.into(),
        }
    }

    pub fn filter(self, predicate: Expression) -> Self {
        RelNode::Filter {
            predicate,
            input: Box::new(self),
        }
    }

    pub fn project(self, exprs: Vec<NamedExpression>) -> Self {
        RelNode::Project {
            exprs,
            input: Box::new(self),
        }
    }

    pub fn join(
        self,
        right: RelNode,
        join_type: JoinType,
        left_keys: Vec<Expression>,
        right_keys: Vec<Expression>,
    ) -> Self {
        RelNode::Join {
            left: Box::new(self),
            right: Box::new(right),
            left_keys,
            right_keys,
            join_type,
        }
    }

    pub fn aggregate(self, group_by: Vec<NamedExpression>, calls: Vec<AggregateCall>) -> Self {
        RelNode::Aggregate {
            group_by,
            calls,
            input: Box::new(self),
        }
    }

    pub fn insert_into(self, target: impl Into<String>) -> Self {
        RelNode::Sink {
            target: target.into(),
            input: Box::new(self),
        }
    }

    /// short label used in compile errors and plan printing
    pub fn label(&self) -> String {
        match self {
            RelNode::Scan { source } => format!("Scan({})", source),
            RelNode::Filter { .. } => "Filter".to_string(),
            RelNode::Project { .. } => "Project".to_string(),
            RelNode::Join { join_type, .. } => format!("Join({})", join_type),
            RelNode::Aggregate { .. } => "Aggregate".to_string(),
            RelNode::Sink { target, .. } => format!("Sink({})", target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// whether unmatched left rows survive the window
    pub fn keeps_left(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    pub fn keeps_right(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => f.write_str("INNER"),
            JoinType::Left => f.write_str("LEFT"),
            JoinType::Right => f.write_str("RIGHT"),
            JoinType::Full => f.write_str("FULL"),
        }
    }
}

/// scalar expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Literal(Value),
    /// reference by name, resolved to a position at compile time
    Field(String),
    /// positional reference into the input tuple
    Column(usize),
    Unary {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        name: String,
        args: Vec<Expression>,
    },
    Cast {
        expr: Box<Expression>,
        to: DataType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        }
    }
}

pub fn field(name: &str) -> Expression {
    Expression::Field(name.to_string())
}

pub fn column(index: usize) -> Expression {
    Expression::Column(index)
}

pub fn lit(value: impl Into<Value>) -> Expression {
    Expression::Literal(value.into())
}

pub fn call(name: &str, args: Vec<Expression>) -> Expression {
    Expression::Call {
        name: name.to_string(),
        args,
    }
}

impl Expression {
    fn binary(self, op: BinaryOperator, right: Expression) -> Expression {
        Expression::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    fn unary(self, op: UnaryOperator) -> Expression {
        Expression::Unary {
            op,
            expr: Box::new(self),
        }
    }

    pub fn add(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::Add, right)
    }

    pub fn sub(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::Subtract, right)
    }

    pub fn mul(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::Multiply, right)
    }

    pub fn div(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::Divide, right)
    }

    pub fn rem(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::Modulo, right)
    }

    pub fn eq(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::Equal, right)
    }

    pub fn not_eq(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::NotEqual, right)
    }

    pub fn lt(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::LessThan, right)
    }

    pub fn lt_eq(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::LessThanOrEqual, right)
    }

    pub fn gt(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::GreaterThan, right)
    }

    pub fn gt_eq(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::GreaterThanOrEqual, right)
    }

    pub fn and(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::And, right)
    }

    pub fn or(self, right: Expression) -> Expression {
        self.binary(BinaryOperator::Or, right)
    }

    pub fn not(self) -> Expression {
        self.unary(UnaryOperator::Not)
    }

    pub fn negate(self) -> Expression {
        self.unary(UnaryOperator::Negate)
    }

    pub fn is_null(self) -> Expression {
        self.unary(UnaryOperator::IsNull)
    }

    pub fn is_not_null(self) -> Expression {
        self.unary(UnaryOperator::IsNotNull)
    }

    pub fn cast(self, to: DataType) -> Expression {
        Expression::Cast {
            expr: Box::new(self),
            to,
        }
    }

    pub fn alias(self, name: &str) -> NamedExpression {
        NamedExpression {
            expr: self,
            alias: Some(name.to_string()),
        }
    }

    pub fn named(self) -> NamedExpression {
        NamedExpression {
            expr: self,
            alias: None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::Varchar(s)) => write!(f, "'{}'", s),
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Field(name) => f.write_str(name),
            Expression::Column(idx) => write!(f, "${}", idx),
            Expression::Unary { op, expr } => match op {
                UnaryOperator::Not => write!(f, "NOT ({})", expr),
                UnaryOperator::Negate => write!(f, "-({})", expr),
                UnaryOperator::IsNull => write!(f, "{} IS NULL", expr),
                UnaryOperator::IsNotNull => write!(f, "{} IS NOT NULL", expr),
            },
            Expression::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expression::Call { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            Expression::Cast { expr, to } => write!(f, "CAST({} AS {})", expr, to),
        }
    }
}

/// expression plus optional output name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpression {
    pub expr: Expression,
    #[serde(default)]
    pub alias: Option<String>,
}

impl From<Expression> for NamedExpression {
    fn from(expr: Expression) -> Self {
        expr.named()
    }
}

/// one aggregate function application, e.g. `MAX(SCORE - AGE) AS M`
/// an empty argument list is `COUNT(*)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCall {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Expression>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl AggregateCall {
    pub fn new(function: &str, args: Vec<Expression>) -> Self {
        Self {
            function: function.to_string(),
            args,
            alias: None,
        }
    }

    pub fn count_star() -> Self {
        Self::new("COUNT", Vec::new())
    }

    pub fn alias(mut self, name: &str) -> Self {
        self.alias = Some(name.to_string());
        self
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}(*)", self.function)
        } else {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "{}({})", self.function, args.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shapes_tree() {
        let plan = RelNode::scan("FOO")
            .filter(field("ID").gt(lit(2)))
            .project(vec![field("ID").named()]);
        match plan {
            RelNode::Project { exprs, input } => {
                assert_eq!(exprs.len(), 1);
                assert!(matches!(*input, RelNode::Filter { .. }));
            }
            _ => panic!("expected Project at the root"),
        }
    }

    #[test]
    fn test_plan_from_json() {
        let json = r#"{
            "filter": {
                "predicate": {"binary": {"op": "greater_than",
                    "left": {"field": "ID"},
                    "right": {"literal": {"Integer": 2}}}},
                "input": {"scan": {"source": "FOO"}}
            }
        }"#;
        let plan: RelNode = serde_json::from_str(json).unwrap();
        assert_eq!(plan, RelNode::scan("FOO").filter(field("ID").gt(lit(2))));
    }

    #[test]
    fn test_display() {
        let expr = field("ID").gt(lit(0)).and(field("NAME").is_null());
        assert_eq!(expr.to_string(), "((ID > 0) AND NAME IS NULL)");
        assert_eq!(AggregateCall::count_star().to_string(), "COUNT(*)");
    }
}
