use crate::{
    function::{expect_args, FunctionEnv, FunctionResult},
    Value,
};

/// Parse the longest numeric prefix of `s`, ignoring leading whitespace.
///
/// Yields `NaN` when no prefix is numeric, so `"12 apples"` reads as `12` and `"apples"` as `NaN`.
pub(crate) fn parse_number_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let sign_len = end;

    let int_digits = bytes[end..].iter().take_while(|b| b.is_ascii_digit()).count();
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = bytes[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits + frac_digits == 0 {
        return if s[sign_len..].starts_with("Infinity") {
            if s.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        } else {
            f64::NAN
        };
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = bytes[exp_end..].iter().take_while(|b| b.is_ascii_digit()).count();
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

pub(crate) fn number(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let [value] = expect_args::<1>(args)?;
    let n = match value {
        Value::Number(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => parse_number_prefix(s),
    };
    Ok(Some(Value::Number(n)))
}

pub(crate) fn string(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let [value] = expect_args::<1>(args)?;
    Ok(Some(Value::String(value.to_string())))
}

pub(crate) fn bool(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let [value] = expect_args::<1>(args)?;
    let b = match value {
        Value::Bool(b) => *b,
        Value::Number(n) => *n >= 1.0,
        Value::String(s) => s == "true",
    };
    Ok(Some(Value::Bool(b)))
}
