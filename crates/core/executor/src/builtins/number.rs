use crate::{
    function::{expect_args, expect_number, FunctionEnv, FunctionResult},
    Value,
};

fn binary(args: &[Value], op: impl FnOnce(f64, f64) -> Value) -> FunctionResult {
    let [a, b] = expect_args::<2>(args)?;
    Ok(Some(op(expect_number(a)?, expect_number(b)?)))
}

pub(crate) fn unary_minus(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let [a] = expect_args::<1>(args)?;
    Ok(Some(Value::Number(-expect_number(a)?)))
}

pub(crate) fn add(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Number(a + b))
}

pub(crate) fn minus(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Number(a - b))
}

pub(crate) fn multiply(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Number(a * b))
}

pub(crate) fn divide(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Number(a / b))
}

/// Truncated remainder: the result takes the sign of the dividend.
pub(crate) fn modulo(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Number(a % b))
}

#[allow(clippy::float_cmp)]
pub(crate) fn equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Bool(a == b))
}

#[allow(clippy::float_cmp)]
pub(crate) fn not_equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Bool(a != b))
}

pub(crate) fn greater_than(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Bool(a > b))
}

pub(crate) fn greater_than_or_equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Bool(a >= b))
}

pub(crate) fn less_than(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Bool(a < b))
}

pub(crate) fn less_than_or_equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Bool(a <= b))
}
