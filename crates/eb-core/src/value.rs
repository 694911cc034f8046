use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::BridgeError;

/// Largest integer a guest number holds exactly (`2^53 - 1`).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;
pub const MIN_SAFE_INTEGER: i64 = -MAX_SAFE_INTEGER;

/// Plain data that can cross the host/guest boundary.
///
/// Guest numbers are a single floating-point kind, so `Number` is an `f64`.
/// Integers move across only through the checked conversions below: a host
/// `i64` outside `MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER` is rejected instead of
/// rounded, and a guest number that is fractional or outside that range is
/// rejected when read back as an integer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    Map(BTreeMap<String, HostValue>),
}

impl HostValue {
    pub fn integer(value: i64) -> Result<Self, BridgeError> {
        if !(MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&value) {
            return Err(BridgeError::conversion(format!(
                "integer {} is outside the safe range of a guest number",
                value
            )));
        }
        Ok(Self::Number(value as f64))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_f64(&self) -> Result<f64, BridgeError> {
        match self {
            Self::Number(value) => Ok(*value),
            other => Err(mismatch("number", other)),
        }
    }

    /// Strict integer read: fails on fractions, non-finite numbers and values
    /// outside the safe-integer range.
    pub fn as_i64(&self) -> Result<i64, BridgeError> {
        let value = self.as_f64()?;
        exact_integer(value)
    }

    pub fn as_i32(&self) -> Result<i32, BridgeError> {
        let value = self.as_i64()?;
        i32::try_from(value).map_err(|_| {
            BridgeError::conversion(format!("integer {} does not fit in i32", value))
        })
    }

    pub fn as_bool(&self) -> Result<bool, BridgeError> {
        match self {
            Self::Bool(value) => Ok(*value),
            other => Err(mismatch("boolean", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, BridgeError> {
        match self {
            Self::String(value) => Ok(value.as_str()),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, HostValue>, BridgeError> {
        match self {
            Self::Map(value) => Ok(value),
            other => Err(mismatch("map", other)),
        }
    }

    /// Numeric coercion used for call arguments: `undefined` is NaN, `null`
    /// is 0, booleans are 0/1 and strings are parsed.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(value) => f64::from(u8::from(*value)),
            Self::Number(value) => *value,
            Self::String(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Self::Array(_) | Self::Map(_) => f64::NAN,
        }
    }

    /// Lenient integer coercion used for call arguments. NaN becomes 0 and
    /// fractions truncate toward zero; magnitudes beyond the safe range fail.
    pub fn to_integer(&self) -> Result<i64, BridgeError> {
        let number = self.to_number();
        if number.is_nan() {
            return Ok(0);
        }
        exact_integer(number.trunc())
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(value) => Self::Number(value.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(value) => Self::String(value),
            serde_json::Value::Array(values) => {
                Self::Array(values.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(values) => Self::Map(
                values
                    .into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// JSON view of the value. `undefined` and non-finite numbers have no
    /// JSON form and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Number(value) => match exact_integer(*value) {
                Ok(integer) => serde_json::Value::from(integer),
                Err(_) => serde_json::Number::from_f64(*value)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Self::String(value) => serde_json::Value::String(value.clone()),
            Self::Array(values) => {
                serde_json::Value::Array(values.iter().map(Self::to_json).collect())
            }
            Self::Map(values) => serde_json::Value::Object(
                values
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

fn exact_integer(value: f64) -> Result<i64, BridgeError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(BridgeError::conversion(format!(
            "number {} is not an integer",
            value
        )));
    }
    if value.abs() > MAX_SAFE_INTEGER as f64 {
        return Err(BridgeError::conversion(format!(
            "number {} is outside the safe integer range",
            value
        )));
    }
    Ok(value as i64)
}

fn mismatch(expected: &str, found: &HostValue) -> BridgeError {
    BridgeError::conversion(format!(
        "expected {}, found {}",
        expected,
        found.type_name()
    ))
}

impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Number(value) => {
                if value.is_nan() {
                    f.write_str("NaN")
                } else if value.is_infinite() {
                    f.write_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
                } else if let Ok(integer) = exact_integer(*value) {
                    write!(f, "{}", integer)
                } else {
                    write!(f, "{}", value)
                }
            }
            Self::String(value) => f.write_str(value),
            Self::Array(_) | Self::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for HostValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(values: Vec<HostValue>) -> Self {
        Self::Array(values)
    }
}

impl From<BTreeMap<String, HostValue>> for HostValue {
    fn from(values: BTreeMap<String, HostValue>) -> Self {
        Self::Map(values)
    }
}

impl TryFrom<i64> for HostValue {
    type Error = BridgeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::integer(value)
    }
}

impl TryFrom<HostValue> for i64 {
    type Error = BridgeError;

    fn try_from(value: HostValue) -> Result<Self, Self::Error> {
        value.as_i64()
    }
}

impl TryFrom<HostValue> for i32 {
    type Error = BridgeError;

    fn try_from(value: HostValue) -> Result<Self, Self::Error> {
        value.as_i32()
    }
}

impl TryFrom<HostValue> for f64 {
    type Error = BridgeError;

    fn try_from(value: HostValue) -> Result<Self, Self::Error> {
        value.as_f64()
    }
}

impl TryFrom<HostValue> for bool {
    type Error = BridgeError;

    fn try_from(value: HostValue) -> Result<Self, Self::Error> {
        value.as_bool()
    }
}

impl TryFrom<HostValue> for String {
    type Error = BridgeError;

    fn try_from(value: HostValue) -> Result<Self, Self::Error> {
        match value {
            HostValue::String(value) => Ok(value),
            other => Err(mismatch("string", &other)),
        }
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn integer_conversion_rejects_values_beyond_safe_range() {
        assert_eq!(
            HostValue::integer(MAX_SAFE_INTEGER).expect("max safe"),
            HostValue::Number(9_007_199_254_740_991.0)
        );
        let error = HostValue::integer(MAX_SAFE_INTEGER + 1).expect_err("beyond safe range");
        assert_eq!(error.kind, ErrorKind::Conversion);
        assert!(HostValue::try_from(i64::MIN).is_err());
    }

    #[test]
    fn strict_integer_read_fails_instead_of_truncating() {
        assert_eq!(HostValue::Number(4_999_950_000.0).as_i64().expect("i64"), 4_999_950_000);
        assert_eq!(
            HostValue::Number(2.5).as_i64().expect_err("fraction").kind,
            ErrorKind::Conversion
        );
        assert!(HostValue::Number(f64::NAN).as_i64().is_err());
        assert!(HostValue::Number(1e300).as_i64().is_err());
        assert!(HostValue::String("3".to_string()).as_i64().is_err());
        assert_eq!(
            HostValue::Number(4_999_950_000.0)
                .as_i32()
                .expect_err("overflow")
                .kind,
            ErrorKind::Conversion
        );
    }

    #[test]
    fn lenient_integer_coercion_follows_guest_rules() {
        assert_eq!(HostValue::Undefined.to_integer().expect("undefined"), 0);
        assert_eq!(HostValue::Null.to_integer().expect("null"), 0);
        assert_eq!(HostValue::Bool(true).to_integer().expect("bool"), 1);
        assert_eq!(HostValue::from(" 42 ").to_integer().expect("string"), 42);
        assert_eq!(HostValue::from("abc").to_integer().expect("nan string"), 0);
        assert_eq!(HostValue::Number(-7.9).to_integer().expect("trunc"), -7);
        assert!(HostValue::Number(f64::INFINITY).to_integer().is_err());
    }

    #[test]
    fn json_view_keeps_integers_integral() {
        let value = HostValue::Map(BTreeMap::from([
            ("abc".to_string(), HostValue::from(123)),
            ("half".to_string(), HostValue::Number(0.5)),
            ("gone".to_string(), HostValue::Undefined),
        ]));
        assert_eq!(
            serde_json::to_string(&value).expect("serialize"),
            r#"{"abc":123,"gone":null,"half":0.5}"#
        );

        let parsed = HostValue::from_json(serde_json::json!({"list": [1, "a", true, null]}));
        assert_eq!(
            parsed,
            HostValue::Map(BTreeMap::from([(
                "list".to_string(),
                HostValue::Array(vec![
                    HostValue::Number(1.0),
                    HostValue::from("a"),
                    HostValue::Bool(true),
                    HostValue::Null,
                ]),
            )]))
        );
    }

    #[test]
    fn display_matches_guest_printing() {
        assert_eq!(HostValue::Number(3.0).to_string(), "3");
        assert_eq!(HostValue::Number(2.5).to_string(), "2.5");
        assert_eq!(HostValue::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(HostValue::Undefined.to_string(), "undefined");
        assert_eq!(HostValue::from("something").to_string(), "something");
        assert_eq!(
            HostValue::Array(vec![HostValue::from(1), HostValue::from("x")]).to_string(),
            r#"[1,"x"]"#
        );
    }

    #[test]
    fn typed_reads_report_mismatches() {
        let error = String::try_from(HostValue::Bool(true)).expect_err("not a string");
        assert_eq!(error.message, "expected string, found boolean");
        assert!(bool::try_from(HostValue::Bool(false)).is_ok());
        assert!(HostValue::Null.as_map().is_err());
    }
}
