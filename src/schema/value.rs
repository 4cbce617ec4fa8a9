use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single cell of a record, as it travels between the wire, the schema and the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
}

/// Field name -> value. Keys are column or field names depending on the side of the store.
pub type Record = BTreeMap<String, Value>;

impl Value {
    /// Null and "" both count as "no value" for optional fields and filters.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Int(_) => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
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

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

/// Renders a record for error messages, e.g. `{age: 69, student_name: 'OBAMA'}`.
pub fn describe_record(record: &Record) -> String {
    let parts: Vec<String> = record
        .iter()
        .map(|(k, v)| match v {
            Value::Null => format!("{k}: null"),
            Value::Int(n) => format!("{k}: {n}"),
            Value::Text(s) => format!("{k}: '{s}'"),
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}
