//! Dynamic row values.
//!
//! A [`Value`] is one cell of a row, shaped by the column's category. Rows
//! handed to the writer and returned by the cursor are `Value` trees whose
//! structure matches the schema.

use std::cmp::Ordering;
use std::fmt;

/// A single value of any column category.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An absent value. The column's present bitmap records it.
    Null,
    /// A boolean value.
    Boolean(bool),
    /// A tinyint value.
    Byte(i8),
    /// A smallint, int or bigint value.
    Int(i64),
    /// A float value.
    Float(f32),
    /// A double value.
    Double(f64),
    /// A string, char or varchar value.
    String(String),
    /// A binary value.
    Binary(Vec<u8>),
    /// A decimal value.
    Decimal(Decimal),
    /// A date value, in days since 1970-01-01.
    Date(i32),
    /// A timestamp value.
    Timestamp(Timestamp),
    /// A list of values.
    List(Vec<Value>),
    /// A map of key/value pairs, in insertion order.
    Map(Vec<(Value, Value)>),
    /// A struct with one value per field, in schema order.
    Struct(Vec<Value>),
    /// A union value: variant tag plus the value of that variant.
    Union(u8, Box<Value>),
}

impl Value {
    /// True for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer value if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean value if this is a `Boolean`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the double value if this is a `Double`.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Binary(v) => {
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
            Value::Union(tag, value) => write!(f, "{}:{}", tag, value),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// A fixed-point decimal: an unscaled integer value and a scale. The i128
/// magnitude covers the format's 38 digit precision bound.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    /// The unscaled value; the represented number is `value * 10^-scale`.
    pub value: i128,
    /// The number of digits after the decimal point.
    pub scale: i32,
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl Decimal {
    /// Creates a decimal from an unscaled value and a scale.
    pub fn new(value: i128, scale: i32) -> Self {
        Self { value, scale }
    }

    /// The approximate floating point equivalent.
    pub fn to_f64(&self) -> f64 {
        self.value as f64 / 10f64.powi(self.scale)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.scale == other.scale {
            return self.value.partial_cmp(&other.value);
        }
        // Rescale the smaller-scale side; fall back to floats when the
        // rescale would overflow 128 bits.
        let (a, b) = if self.scale < other.scale {
            let diff = (other.scale - self.scale) as u32;
            match 10i128.checked_pow(diff).and_then(|m| self.value.checked_mul(m)) {
                Some(scaled) => (scaled, other.value),
                None => return self.to_f64().partial_cmp(&other.to_f64()),
            }
        } else {
            let diff = (self.scale - other.scale) as u32;
            match 10i128.checked_pow(diff).and_then(|m| other.value.checked_mul(m)) {
                Some(scaled) => (self.value, scaled),
                None => return self.to_f64().partial_cmp(&other.to_f64()),
            }
        };
        a.partial_cmp(&b)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale <= 0 {
            return write!(f, "{}", self.value);
        }
        let negative = self.value < 0;
        let digits = self.value.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let sign = if negative { "-" } else { "" };
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        } else {
            write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
        }
    }
}

/// A point in time: seconds since the Unix epoch plus nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Whole seconds since 1970-01-01 00:00:00 UTC.
    pub seconds: i64,
    /// Nanoseconds within the second, 0..1_000_000_000.
    pub nanos: u32,
}

impl Timestamp {
    /// Creates a timestamp from seconds and nanoseconds.
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Milliseconds since the Unix epoch, as used by timestamp statistics.
    pub fn millis(&self) -> i64 {
        self.seconds * 1000 + (self.nanos / 1_000_000) as i64
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::String("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Int(7).as_str(), None);
    }

    #[test]
    fn test_decimal_display() {
        assert_eq!(Decimal::new(12345, 2).to_string(), "123.45");
        assert_eq!(Decimal::new(-12345, 2).to_string(), "-123.45");
        assert_eq!(Decimal::new(5, 3).to_string(), "0.005");
        assert_eq!(Decimal::new(42, 0).to_string(), "42");
    }

    #[test]
    fn test_decimal_ordering() {
        assert!(Decimal::new(100, 2) < Decimal::new(200, 2));
        // 1.00 == 1.0 after rescaling.
        assert_eq!(
            Decimal::new(100, 2).partial_cmp(&Decimal::new(10, 1)),
            Some(Ordering::Equal)
        );
        assert!(Decimal::new(15, 1) > Decimal::new(1, 0));
    }

    #[test]
    fn test_timestamp_millis() {
        let ts = Timestamp::new(10, 250_000_000);
        assert_eq!(ts.millis(), 10_250);
    }

    #[test]
    fn test_display_compound() {
        let v = Value::List(vec![Value::Int(1), Value::Null, Value::Int(3)]);
        assert_eq!(v.to_string(), "[1,,3]");
        let m = Value::Map(vec![(Value::String("a".into()), Value::Int(1))]);
        assert_eq!(m.to_string(), "{a:1}");
    }
}
