use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumDiscriminants};

use crate::builtins::math::round_half_up;

/// An operand on the stack or in variable storage.
///
/// Dialogue programs only ever manipulate booleans, double-precision numbers and strings, so the
/// enum is closed over exactly those three kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(ValueKind), derive(Hash, StrumDisplay, Serialize, Deserialize))]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// A string.
    String(String),
}

impl Value {
    /// The runtime kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        ValueKind::from(self)
    }

    /// Returns the boolean, if this value is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this value is one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this value is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets this value as an instruction index or a count.
    ///
    /// Only non-negative integral numbers qualify.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// Renders this value for insertion into a line or command.
    ///
    /// Booleans are capitalised and non-integral numbers are fixed to one decimal place, with
    /// exact ties rounded away from zero.
    #[must_use]
    pub fn to_substitution(&self) -> String {
        match self {
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Number(n) if n.is_finite() && n.fract() != 0.0 => format_tenths(*n),
            other => other.to_string(),
        }
    }
}

/// Formats `n` to one decimal place.
///
/// `{:.1}` rounds exact ties to even. The only values that sit exactly halfway between two
/// tenths are odd multiples of a quarter, and those are rounded away from zero instead.
fn format_tenths(n: f64) -> String {
    let quarters = n * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 != 0.0 {
        let tenths = round_half_up(n.abs() * 10.0) / 10.0;
        format!("{:.1}", tenths.copysign(n))
    } else {
        format!("{n:.1}")
    }
}

/// Formats a number the way script authors expect to read it: integral values carry no
/// fractional part and negative zero prints as `0`.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Value::Bool(true), "True")]
    #[case(Value::Bool(false), "False")]
    #[case(Value::Number(3.0), "3")]
    #[case(Value::Number(2.26), "2.3")]
    #[case(Value::Number(-0.74), "-0.7")]
    #[case(Value::Number(0.25), "0.3")]
    #[case(Value::Number(2.25), "2.3")]
    #[case(Value::Number(0.75), "0.8")]
    #[case(Value::Number(-2.25), "-2.3")]
    #[case(Value::Number(0.15), "0.1")]
    #[case(Value::String("gold".into()), "gold")]
    fn substitution_rendering(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_substitution(), expected);
    }

    #[rstest]
    #[case(Value::Number(1.5), "1.5")]
    #[case(Value::Number(-0.0), "0")]
    #[case(Value::Number(f64::INFINITY), "Infinity")]
    #[case(Value::Bool(true), "true")]
    fn display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn index_conversion() {
        assert_eq!(Value::Number(4.0).as_index(), Some(4));
        assert_eq!(Value::Number(4.5).as_index(), None);
        assert_eq!(Value::Number(-1.0).as_index(), None);
        assert_eq!(Value::from("4").as_index(), None);
    }

    #[test]
    fn kinds() {
        assert_eq!(Value::from(1).kind(), ValueKind::Number);
        assert_eq!(Value::from("x").kind(), ValueKind::String);
        assert_eq!(ValueKind::Bool.to_string(), "Bool");
    }
}
