use crate::{
    function::{expect_args, expect_bool, FunctionEnv, FunctionResult},
    Value,
};

fn binary(args: &[Value], op: impl FnOnce(bool, bool) -> bool) -> FunctionResult {
    let [a, b] = expect_args::<2>(args)?;
    Ok(Some(Value::Bool(op(expect_bool(a)?, expect_bool(b)?))))
}

pub(crate) fn not(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let [a] = expect_args::<1>(args)?;
    Ok(Some(Value::Bool(!expect_bool(a)?)))
}

pub(crate) fn equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| a == b)
}

/// Also serves as `Bool.Xor`.
pub(crate) fn not_equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| a != b)
}

pub(crate) fn or(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| a || b)
}

pub(crate) fn and(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| a && b)
}
