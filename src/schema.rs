use serde::{Deserialize, Serialize};
use std::fmt;

/// logical type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Integer,
    Float,
    Boolean,
    Varchar,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => f.write_str("INTEGER"),
            DataType::Float => f.write_str("FLOAT"),
            DataType::Boolean => f.write_str("BOOLEAN"),
            DataType::Varchar => f.write_str("VARCHAR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// ordered field list describing the shape of every tuple a stage emits
/// field positions are the only addressing used at runtime
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// build a schema, rejecting duplicate field names
    pub fn new(fields: Vec<Field>) -> Result<Self, String> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(format!("duplicate field '{}'", field.name));
            }
        }
        Ok(Self { fields })
    }

    /// build a schema from (name, type) pairs
    /// panics on duplicate names, meant for literals in tests and demos
    pub fn of(fields: &[(&str, DataType)]) -> Self {
        let fields = fields
            .iter()
            .map(|(name, data_type)| Field::new(*name, *data_type))
            .collect();
        match Self::new(fields) {
            Ok(schema) => schema,
            Err(e) => panic!("invalid schema literal: {}", e),
        }
    }

    /// build a schema from a derived field list
    /// a name clashing with an earlier field gets a numeric suffix (ID, ID -> ID, ID0)
    pub fn deduplicated(fields: Vec<Field>) -> Self {
        let mut unique: Vec<Field> = Vec::with_capacity(fields.len());
        for field in fields {
            let mut name = field.name.clone();
            let mut suffix = 0;
            while unique.iter().any(|f| f.name == name) {
                name = format!("{}{}", field.name, suffix);
                suffix += 1;
            }
            unique.push(Field::new(name, field.data_type));
        }
        Self { fields: unique }
    }

    /// concatenation used for join outputs, clashing right-side names are suffixed
    pub fn concat(left: &Schema, right: &Schema) -> Self {
        Self::deduplicated(left.fields.iter().chain(&right.fields).cloned().collect())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// resolve a field name to its position
    /// exact match first, then a unique case-insensitive match
    pub fn index_of(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.fields.iter().position(|f| f.name == name) {
            return Some(idx);
        }
        let mut matches = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name.eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some((idx, _)), None) => Some(idx),
            _ => None,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn types(&self) -> Vec<DataType> {
        self.fields.iter().map(|f| f.data_type).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{}:{}", field.name, field.data_type))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
