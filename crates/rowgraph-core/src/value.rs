//! Runtime scalar values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::catalog::{BindTag, ScalarType};
use crate::config::Formats;
use crate::error::Error;

/// A runtime scalar value held by an entity field or bound to a statement.
///
/// This enum represents all possible values a column-backed field can hold.
/// It maps to the scalar types defined in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The canonical string bound to a prepared statement parameter for this
    /// value. Temporal values are rendered with the configured formats;
    /// booleans are rendered as 0/1.
    ///
    /// Returns `None` for null.
    pub fn to_bind_string(&self, formats: &Formats) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "1".into() } else { "0".into() }),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Date(d) => Some(d.format(&formats.date).to_string()),
            Value::Time(t) => Some(t.format(&formats.time).to_string()),
            Value::DateTime(dt) => Some(dt.format(&formats.datetime).to_string()),
        }
    }

    /// Parse a driver column value into a typed value.
    ///
    /// A missing column value (SQL NULL) parses to `Value::Null` regardless
    /// of the target type.
    pub fn parse(
        raw: Option<&str>,
        scalar: ScalarType,
        formats: &Formats,
    ) -> Result<Value, Error> {
        let raw = match raw {
            None => return Ok(Value::Null),
            Some(raw) => raw,
        };

        let parsed = match scalar {
            ScalarType::Int => raw.parse::<i64>().ok().map(Value::Int),
            ScalarType::Float => raw.parse::<f64>().ok().map(Value::Float),
            ScalarType::Bool => match raw {
                "0" => Some(Value::Bool(false)),
                "1" => Some(Value::Bool(true)),
                _ => None,
            },
            ScalarType::Text | ScalarType::Email | ScalarType::Color | ScalarType::Enum => {
                Some(Value::Text(raw.to_string()))
            }
            ScalarType::Date => NaiveDate::parse_from_str(raw, &formats.date)
                .ok()
                .map(Value::Date),
            ScalarType::Time => NaiveTime::parse_from_str(raw, &formats.time)
                .ok()
                .map(Value::Time),
            ScalarType::DateTime => NaiveDateTime::parse_from_str(raw, &formats.datetime)
                .ok()
                .map(Value::DateTime),
        };

        parsed.ok_or_else(|| {
            Error::Validation(format!("cannot parse '{raw}' as a {scalar} value"))
        })
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Parameters collected for a prepared statement.
///
/// The type string holds one bind tag character per value, in bind order.
/// When empty, a query can run over the plain (non-prepared) path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementParams {
    /// Bind tag characters, one per value.
    pub tags: String,
    /// Bound values in canonical string form.
    pub values: Vec<String>,
}

impl StatementParams {
    /// Create an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value with its bind tag.
    pub fn push(&mut self, tag: BindTag, value: String) {
        self.tags.push(tag.as_char());
        self.values.push(value);
    }

    /// Append all parameters from another list, preserving order.
    pub fn extend(&mut self, other: &StatementParams) {
        self.tags.push_str(&other.tags);
        self.values.extend(other.values.iter().cloned());
    }

    /// Whether no parameters were collected.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of bound values.
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_i64(), Some(42));
        assert_eq!(Value::Int(42).as_f64(), Some(42.0)); // Widening conversion
        assert_eq!(Value::Text("hello".into()).as_str(), Some("hello"));
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = true.into();
        assert_eq!(v, Value::Bool(true));

        let v: Value = "hello".into();
        assert_eq!(v, Value::Text("hello".into()));

        let v: Value = None::<i64>.into();
        assert_eq!(v, Value::Null);

        let v: Value = Some(42i64).into();
        assert_eq!(v, Value::Int(42));
    }

    #[test]
    fn test_bind_strings() {
        let formats = Formats::default();
        assert_eq!(Value::Null.to_bind_string(&formats), None);
        assert_eq!(Value::Bool(true).to_bind_string(&formats), Some("1".into()));
        assert_eq!(Value::Int(-7).to_bind_string(&formats), Some("-7".into()));

        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            Value::Date(date).to_bind_string(&formats),
            Some("2024-03-15".into())
        );
        let dt = date.and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(
            Value::DateTime(dt).to_bind_string(&formats),
            Some("2024-03-15 10:30:00".into())
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        let formats = Formats::default();
        assert_eq!(
            Value::parse(Some("42"), ScalarType::Int, &formats).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            Value::parse(Some("1"), ScalarType::Bool, &formats).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Value::parse(None, ScalarType::Int, &formats).unwrap(),
            Value::Null
        );

        let parsed = Value::parse(Some("2024-03-15 10:30:00"), ScalarType::DateTime, &formats)
            .unwrap();
        assert_eq!(
            parsed.to_bind_string(&formats),
            Some("2024-03-15 10:30:00".into())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let formats = Formats::default();
        assert!(Value::parse(Some("abc"), ScalarType::Int, &formats).is_err());
        assert!(Value::parse(Some("maybe"), ScalarType::Bool, &formats).is_err());
    }

    #[test]
    fn test_statement_params() {
        let mut params = StatementParams::new();
        assert!(params.is_empty());

        params.push(BindTag::Int, "5".into());
        params.push(BindTag::Text, "alice".into());
        assert_eq!(params.tags, "is");
        assert_eq!(params.values, vec!["5".to_string(), "alice".to_string()]);

        let mut more = StatementParams::new();
        more.push(BindTag::Double, "2.5".into());
        params.extend(&more);
        assert_eq!(params.tags, "isd");
        assert_eq!(params.len(), 3);
    }
}
