use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Typed field values. Source data mostly arrives as text; [`Value::parse`]
/// recovers the numeric types so rules can compare them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ValueRepr", into = "ValueRepr")]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// A value that couldn't be produced, e.g. a type incompatibility found
    /// while parsing or evaluating.
    Error(String),
}

/// Wire form: numbers, bools and strings map to their JSON counterparts,
/// errors to `{"error": "..."}`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ValueRepr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Error { error: String },
}

impl From<ValueRepr> for Value {
    fn from(repr: ValueRepr) -> Self {
        match repr {
            ValueRepr::Int(i) => Value::Int(i),
            ValueRepr::Float(f) => Value::Float(f),
            ValueRepr::Bool(b) => Value::Bool(b),
            ValueRepr::Str(s) => Value::Str(s),
            ValueRepr::Error { error } => Value::Error(error),
        }
    }
}

impl From<Value> for ValueRepr {
    fn from(value: Value) -> Self {
        match value {
            Value::Int(i) => ValueRepr::Int(i),
            Value::Float(f) => ValueRepr::Float(f),
            Value::Bool(b) => ValueRepr::Bool(b),
            Value::Str(s) => ValueRepr::Str(s),
            Value::Error(error) => ValueRepr::Error { error },
        }
    }
}

impl Value {
    /// Parse raw text into the narrowest value type: integer, then finite
    /// float, otherwise string. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Value {
        let s = raw.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Value::Int(i);
        }
        match parse_finite_float(s) {
            Some(f) => Value::Float(f),
            None => Value::Str(raw.to_string()),
        }
    }

    /// Build a numeric value rounded to `dp` decimal places. Zero decimal
    /// places yields an integer when it fits.
    pub fn number(f: f64, dp: usize) -> Value {
        let rounded = round_to(f, dp);
        if dp == 0 && rounded.abs() < 9.0e15 {
            Value::Int(rounded as i64)
        } else {
            Value::Float(rounded)
        }
    }

    /// Numeric view of the value. Strings holding numbers count as numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => {
                let t = s.trim();
                t.parse::<i64>()
                    .map(|i| i as f64)
                    .ok()
                    .or_else(|| parse_finite_float(t))
            }
            Value::Bool(_) | Value::Error(_) => None,
        }
    }

    /// Integer view: integers, integral floats and integer strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(*f as i64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Str(s) => match s.trim() {
                "true" | "TRUE" | "True" => Some(true),
                "false" | "FALSE" | "False" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        self.as_f64().is_some()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Number of decimal places in the canonical string form.
    pub fn num_dp(&self) -> usize {
        match self {
            Value::Float(_) | Value::Str(_) => {
                let s = self.to_string();
                match s.split_once('.') {
                    Some((_, frac)) => frac.chars().take_while(|c| c.is_ascii_digit()).count(),
                    None => 0,
                }
            }
            _ => 0,
        }
    }

    /// Ordering used when sorting: numeric when both sides are numbers,
    /// otherwise by canonical string.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
            Value::Error(e) => f.write_str(e),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Shortest decimal form without exponent; integral floats drop the `.0`.
pub fn format_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    format!("{}", f)
}

/// Round half away from zero at `dp` decimal places.
pub fn round_to(f: f64, dp: usize) -> f64 {
    if !f.is_finite() {
        return f;
    }
    let dp = dp.min(200);
    let formatted = format!("{:.*}", dp, f);
    let rounded: f64 = formatted.parse().unwrap_or(f);
    // format! rounds ties to even on the binary value; nudge exact ties away
    // from zero so 2.5 -> 3 and 0.125 -> 0.13.
    if dp < 17 {
        let scale = 10f64.powi(dp as i32);
        let scaled = f * scale;
        if (scaled.fract().abs() - 0.5).abs() < f64::EPSILON * scaled.abs().max(1.0) {
            return (scaled.trunc() + scaled.signum()) / scale;
        }
    }
    rounded
}

fn parse_finite_float(s: &str) -> Option<f64> {
    // Rust accepts "inf", "NaN" and friends; datasets shouldn't.
    let first = s.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '+' || first == '.') {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_picks_narrowest_type() {
        assert_eq!(Value::parse("42"), Value::Int(42));
        assert_eq!(Value::parse(" -7 "), Value::Int(-7));
        assert_eq!(Value::parse("4.25"), Value::Float(4.25));
        assert_eq!(Value::parse("red"), Value::Str("red".to_string()));
        assert_eq!(Value::parse("inf"), Value::Str("inf".to_string()));
        assert_eq!(Value::parse("NaN"), Value::Str("NaN".to_string()));
    }

    #[test]
    fn floats_render_without_trailing_zero() {
        assert_eq!(Value::Float(2.0).to_string(), "2");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
        assert_eq!(Value::Float(-0.0).to_string(), "0");
        assert_eq!(Value::Float(1250.5).to_string(), "1250.5");
    }

    #[test]
    fn num_dp_counts_decimal_places() {
        assert_eq!(Value::Int(12).num_dp(), 0);
        assert_eq!(Value::Float(1.25).num_dp(), 2);
        assert_eq!(Value::Float(3.0).num_dp(), 0);
        assert_eq!(Value::Str("7.125".to_string()).num_dp(), 3);
    }

    #[test]
    fn round_to_rounds_half_away_from_zero() {
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
        assert_eq!(round_to(1.234, 2), 1.23);
        assert_eq!(round_to(1.235, 1), 1.2);
        assert_eq!(round_to(7.0, 200), 7.0);
    }

    #[test]
    fn number_builds_ints_at_zero_dp() {
        assert_eq!(Value::number(4.6, 0), Value::Int(5));
        assert_eq!(Value::number(4.66, 1), Value::Float(4.7));
    }

    #[test]
    fn numeric_strings_behave_as_numbers() {
        assert_eq!(Value::Str("3.5".to_string()).as_f64(), Some(3.5));
        assert_eq!(Value::Str("abc".to_string()).as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn compare_is_numeric_for_numbers() {
        assert_eq!(Value::Int(10).compare(&Value::Float(9.5)), Ordering::Greater);
        assert_eq!(Value::from("b").compare(&Value::from("a")), Ordering::Greater);
    }

    #[test]
    fn json_round_trip_keeps_types() {
        let values = vec![
            Value::Int(3),
            Value::Float(2.5),
            Value::Bool(false),
            Value::from("x"),
            Value::Error("incompatible types".to_string()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[3,2.5,false,"x",{"error":"incompatible types"}]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }
}
