use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// A typed value bound into a SQL statement.
///
/// Every value that reaches the database travels as a bind parameter, never
/// as SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::Int(i64::from(v))
                }
            }
        )+
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Float(f64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// Declared type of a filterable column.
///
/// Filter values arrive as loosely-typed strings (query-string parameters);
/// the kind decides how they are parsed before being bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Bool,
    Uuid,
    Timestamp,
    Date,
}

impl ValueKind {
    /// Parse a raw filter value. Returns `None` when the input does not parse.
    pub fn parse(self, raw: &str) -> Option<SqlValue> {
        let raw = raw.trim();
        match self {
            ValueKind::Text => Some(SqlValue::Text(raw.to_string())),
            ValueKind::Integer => raw.parse::<i64>().ok().map(SqlValue::Int),
            ValueKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(SqlValue::Float),
            ValueKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(SqlValue::Bool(true)),
                "false" | "0" | "no" => Some(SqlValue::Bool(false)),
                _ => None,
            },
            ValueKind::Uuid => Uuid::parse_str(raw).ok().map(SqlValue::Uuid),
            ValueKind::Timestamp => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|t| SqlValue::Timestamp(t.with_timezone(&Utc))),
            ValueKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(SqlValue::Date),
        }
    }

    /// Whether `_min` / `_max` range comparisons make sense for this kind.
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            ValueKind::Integer | ValueKind::Float | ValueKind::Timestamp | ValueKind::Date
        )
    }
}
