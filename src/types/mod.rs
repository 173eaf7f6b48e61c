use std::fmt;

use ordered_float::OrderedFloat;

/// Scalar types known to the planner. Only what the rewrite rules and their
/// tests need; the full type system lives with the catalog/runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DataType::Boolean => "boolean",
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Utf8 => "utf8",
        };
        write!(f, "{}", s)
    }
}

/// A scalar value. `OrderedFloat` keeps datums totally ordered so sort and
/// merge semantics are well defined in tests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
}

impl Datum {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Datum::Null => None,
            Datum::Boolean(_) => Some(DataType::Boolean),
            Datum::Int64(_) => Some(DataType::Int64),
            Datum::Float64(_) => Some(DataType::Float64),
            Datum::Utf8(_) => Some(DataType::Utf8),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Boolean(v) => Some(*v),
            _ => None,
        }
    }

}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int64(v)
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Boolean(v)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Float64(OrderedFloat(v))
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "null"),
            Datum::Boolean(v) => write!(f, "{}", v),
            Datum::Int64(v) => write!(f, "{}", v),
            Datum::Float64(v) => write!(f, "{}", v),
            Datum::Utf8(v) => write!(f, "'{}'", v),
        }
    }
}

/// One column of a row type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
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

/// Ordered, named, typed output columns of a plan node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowType {
    pub fields: Vec<Field>,
}

impl RowType {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }
}

/// An in-memory row, used by program/aggregate evaluation in tests.
pub type Row = Vec<Datum>;
