//! Plain scalars as they come back from the query service, and the typed values bound to query
//! parameters.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

///A single unwrapped cell of a projection row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    ///Unwrap a cell as returned by the server. Cells are either `null`, a bare JSON scalar or a
    ///typed wrapper object carrying its payload under `val`. Wrappers may nest.
    pub fn unwrap_rtype(cell: &serde_json::Value) -> Result<Value> {
        use serde_json::Value as J;
        match cell {
            J::Null => Ok(Value::Null),
            J::Bool(b) => Ok(Value::Bool(*b)),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(Error::Response(format!("unrepresentable number {n}")))
                }
            }
            J::String(s) => Ok(Value::Str(s.clone())),
            J::Object(map) => match map.get("val") {
                Some(inner) => Value::unwrap_rtype(inner),
                None => Err(Error::Response(format!("cell without a value: {cell}"))),
            },
            J::Array(_) => Err(Error::Response(format!("collection cell {cell}"))),
        }
    }

    ///Text for a CSV field. Nulls become empty fields.
    pub fn to_field(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

///Console rendering, nulls show as `None`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Value::Null, Into::into)
    }
}

///Typed value of a bound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RType {
    Long(i64),
    ///milliseconds since the unix epoch
    Time(i64),
}

impl RType {
    ///The value as query text: a plain integer, or a quoted UTC timestamp
    pub fn literal(&self) -> Result<String> {
        match *self {
            RType::Long(i) => Ok(i.to_string()),
            RType::Time(ms) => {
                let t = chrono::DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| Error::Date(format!("{ms} ms is out of range")))?;
                Ok(t.format("'%Y-%m-%d %H:%M:%S%.3f'").to_string())
            }
        }
    }
}

///Named parameters bound into a query (`:name` placeholders)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    map: BTreeMap<String, RType>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: &str, value: RType) -> Self {
        self.map.insert(name.to_string(), value);
        self
    }

    pub fn add_id(self, id: i64) -> Self {
        self.add("id", RType::Long(id))
    }

    pub fn get(&self, name: &str) -> Option<&RType> {
        self.map.get(name)
    }
}
