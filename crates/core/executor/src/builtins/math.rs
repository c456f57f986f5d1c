use rand::Rng;

use crate::{
    function::{expect_args, expect_number, FunctionEnv, FunctionError, FunctionResult},
    Value,
};

/// Round half up, towards positive infinity.
pub(crate) fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

/// A uniformly distributed integer step from `min` up to and including `max`.
fn random_range_inclusive(min: f64, max: f64) -> f64 {
    (rand::thread_rng().gen::<f64>() * (max - min + 1.0)).floor() + min
}

fn unary(args: &[Value], op: impl FnOnce(f64) -> f64) -> FunctionResult {
    let [value] = expect_args::<1>(args)?;
    Ok(Some(Value::Number(op(expect_number(value)?))))
}

pub(crate) fn random(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    expect_args::<0>(args)?;
    Ok(Some(Value::Number(rand::thread_rng().gen())))
}

pub(crate) fn random_range(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let [from, to] = expect_args::<2>(args)?;
    let (from, to) = (expect_number(from)?, expect_number(to)?);
    Ok(Some(Value::Number(random_range_inclusive(from.min(to), from.max(to)))))
}

pub(crate) fn dice(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let [sides] = expect_args::<1>(args)?;
    let sides = expect_number(sides)?;
    if sides < 1.0 {
        return Err(FunctionError::Custom(
            "dice() must be called with a number greater than zero".to_string(),
        ));
    }
    Ok(Some(Value::Number(random_range_inclusive(1.0, sides))))
}

pub(crate) fn round(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    unary(args, round_half_up)
}

/// Round to `places` decimal places, halves away from zero.
pub(crate) fn round_places(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let [value, places] = expect_args::<2>(args)?;
    let (value, places) = (expect_number(value)?, expect_number(places)?);
    if !(0.0..=100.0).contains(&places) || places.fract() != 0.0 {
        return Err(FunctionError::Custom(format!(
            "round_places() needs a whole number of places between 0 and 100, got {places}"
        )));
    }
    let scale = 10f64.powi(places as i32);
    let rounded = value.signum() * round_half_up(value.abs() * scale) / scale;
    Ok(Some(Value::Number(if rounded.is_finite() { rounded } else { value })))
}

pub(crate) fn floor(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    unary(args, f64::floor)
}

pub(crate) fn ceil(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    unary(args, f64::ceil)
}

pub(crate) fn inc(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    unary(args, |v| round_half_up(v) + 1.0)
}

pub(crate) fn dec(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    unary(args, |v| round_half_up(v) - 1.0)
}

/// The fractional remainder, keeping the sign of the input.
pub(crate) fn decimal(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    unary(args, |v| v % 1.0)
}

pub(crate) fn int(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    unary(args, f64::trunc)
}
