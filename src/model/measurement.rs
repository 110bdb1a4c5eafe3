//! Data points
//!
//! A measurement is one value of one series at one timestamp. On the wire
//! it is the series object with `timestamp` and `value` added:
//!
//! ```json
//! {"metric": "sys.cpu.nice", "tags": {"host": "web01"}, "timestamp": 1346846400, "value": 18}
//! ```
//!
//! # Value rules
//!
//! - Integers are signed 64-bit
//! - Floats must be finite
//! - Strings are parsed: a `.` makes them a float, otherwise an integer, and
//!   the range check applies to the parsed type
//!
//! # Timestamp rules
//!
//! Seconds or milliseconds since the epoch, non-negative, at most 13 decimal
//! digits.

use super::{invalid, Entity, TimeSeries, Validate};
use crate::client::{Client, PutOptions};
use crate::error::{Result, ValidationError};
use crate::transport::Transport;
use crate::validation::{is_valid_timestamp, MAX_TIMESTAMP_DIGITS};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// MeasurementValue
// =============================================================================

/// Numeric value of a data point
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawValue")]
pub enum MeasurementValue {
    /// Signed 64-bit integer
    Integer(i64),
    /// Floating point number
    Float(f64),
}

/// Every shape a value may take in a payload
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl MeasurementValue {
    /// Parse a textual value
    ///
    /// Text containing `.` is a float; anything else must be an integer that
    /// fits 64 bits.
    pub fn parse(text: &str) -> std::result::Result<Self, ValidationError> {
        let text = text.trim();
        if text.contains('.') {
            let value = text
                .parse::<f64>()
                .map_err(|e| invalid("Measurement", format!("'{}' is not a float: {}", text, e)))?;
            Self::Float(value).checked()
        } else {
            let wide = text
                .parse::<i128>()
                .map_err(|e| invalid("Measurement", format!("'{}' is not an integer: {}", text, e)))?;
            Self::try_from(wide)
        }
    }

    fn checked(self) -> std::result::Result<Self, ValidationError> {
        match self {
            Self::Float(v) if !v.is_finite() => {
                Err(invalid("Measurement", format!("value {} is not finite", v)))
            }
            other => Ok(other),
        }
    }

    /// Value as a float, converting integers
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Integer(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl TryFrom<i128> for MeasurementValue {
    type Error = ValidationError;

    fn try_from(value: i128) -> std::result::Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self::Integer)
            .map_err(|_| invalid("Measurement", format!("integer {} is outside the 64-bit range", value)))
    }
}

impl TryFrom<&str> for MeasurementValue {
    type Error = ValidationError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<RawValue> for MeasurementValue {
    type Error = ValidationError;

    fn try_from(raw: RawValue) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawValue::Integer(v) => Ok(Self::Integer(v)),
            RawValue::Unsigned(v) => Self::try_from(i128::from(v)),
            RawValue::Float(v) => Self::Float(v).checked(),
            RawValue::Text(s) => Self::parse(&s),
        }
    }
}

impl FromStr for MeasurementValue {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for MeasurementValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for MeasurementValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for MeasurementValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl Serialize for MeasurementValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match *self {
            Self::Integer(v) => serializer.serialize_i64(v),
            Self::Float(v) => serializer.serialize_f64(v),
        }
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

// =============================================================================
// Measurement
// =============================================================================

/// One data point of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// The series the point belongs to
    #[serde(flatten)]
    pub series: TimeSeries,

    /// Seconds or milliseconds since the epoch
    pub timestamp: i64,

    /// The measured value
    pub value: MeasurementValue,
}

impl Measurement {
    /// Create a validated measurement
    pub fn new(series: TimeSeries, timestamp: i64, value: impl Into<MeasurementValue>) -> Result<Self> {
        Self {
            series,
            timestamp,
            value: value.into(),
        }
        .ensure_valid()
    }

    /// Create a measurement from a textual value
    pub fn parse(series: TimeSeries, timestamp: i64, value: &str) -> Result<Self> {
        let value = MeasurementValue::parse(value)?;
        Self::new(series, timestamp, value)
    }

    /// Write this single point
    pub fn save_to<T: Transport>(&self, client: &Client<T>) -> Result<()> {
        client
            .put_measurements(std::slice::from_ref(self), PutOptions::default())
            .map(|_| ())
    }
}

impl Validate for Measurement {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        self.series.check()?;
        if !is_valid_timestamp(self.timestamp) {
            return Err(invalid(
                Self::KIND,
                format!(
                    "timestamp {} must be non-negative with at most {} digits",
                    self.timestamp, MAX_TIMESTAMP_DIGITS
                ),
            ));
        }
        self.value.checked()?;
        Ok(())
    }
}

impl Entity for Measurement {
    const KIND: &'static str = "Measurement";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series() -> TimeSeries {
        TimeSeries::new("sys.cpu.nice", [("host", "web01")]).unwrap()
    }

    #[test]
    fn test_integer_bounds() {
        assert!(Measurement::parse(series(), 0, "9223372036854775807").is_ok());
        assert!(Measurement::parse(series(), 0, "-9223372036854775808").is_ok());
        assert!(Measurement::parse(series(), 0, "9223372036854775808").is_err());
        assert!(MeasurementValue::try_from(9_223_372_036_854_775_808i128).is_err());
    }

    #[test]
    fn test_text_type_decides_range() {
        // with a dot this is a float, so the integer range does not apply
        let m = Measurement::parse(series(), 0, "9223372036854775808.0").unwrap();
        assert!(matches!(m.value, MeasurementValue::Float(_)));

        let m = Measurement::parse(series(), 0, "42").unwrap();
        assert_eq!(m.value, MeasurementValue::Integer(42));
    }

    #[test]
    fn test_timestamp_digits() {
        assert!(Measurement::new(series(), 1_234_567_890_123, 1).is_ok());
        assert!(Measurement::new(series(), 12_345_678_901_234, 1).is_err());
        assert!(Measurement::new(series(), -1, 1).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Measurement::new(series(), 0, f64::NAN).is_err());
        assert!(Measurement::new(series(), 0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_wire_shape() {
        let m = Measurement::new(series(), 1346846400, 18).unwrap();
        let wire = serde_json::Value::Object(m.to_wire_map().unwrap());
        assert_eq!(
            wire,
            json!({"metric": "sys.cpu.nice", "tags": {"host": "web01"}, "timestamp": 1346846400, "value": 18})
        );
    }

    #[test]
    fn test_decode_quoted_value() {
        let m = Measurement::from_value(json!({
            "metric": "tsd.hbase.puts",
            "timestamp": 1369350222,
            "value": "1.5",
            "tags": {"host": "tsd01"}
        }))
        .unwrap();
        assert_eq!(m.value, MeasurementValue::Float(1.5));
    }

    #[test]
    fn test_decode_unsigned_overflow() {
        let res = Measurement::from_value(json!({
            "metric": "m",
            "timestamp": 1,
            "value": 9223372036854775808u64,
            "tags": {"k": "v"}
        }));
        assert!(res.is_err());
    }
}
