//! Column values and decoded records.

use super::schema::Schema;

/// A single column value.
///
/// Decoding always yields the variant that matches the column type:
/// `Int` for INT, `Float` for FLOAT, `Text` for VARCHAR and DATE, and
/// `FloatPair` for ARRAY[FLOAT;2]. Encoding also accepts `Null` and
/// convertible variants (for example `Text("42")` for an INT column).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value; encodes to the column default.
    Null,
    Int(i32),
    Float(f32),
    Text(String),
    FloatPair(f32, f32),
}

impl Value {
    /// Returns the integer, if this is an `Int`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float, if this is a `Float`.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string, if this is a `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns both floats, if this is a `FloatPair`.
    pub fn as_float_pair(&self) -> Option<(f32, f32)> {
        match self {
            Value::FloatPair(a, b) => Some((*a, *b)),
            _ => None,
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<(f32, f32)> for Value {
    fn from(v: (f32, f32)) -> Self {
        Value::FloatPair(v.0, v.1)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::FloatPair(a, b) => write!(f, "[{}, {}]", a, b),
        }
    }
}

/// One value per schema column, in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Creates a record from its values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns the value at column `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the value of the named column.
    pub fn get_by_name(&self, schema: &Schema, name: &str) -> Option<&Value> {
        schema.column_index(name).and_then(|i| self.values.get(i))
    }

    /// Returns all values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the record holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the record, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}
