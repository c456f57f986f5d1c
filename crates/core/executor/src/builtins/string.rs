use crate::{
    function::{expect_args, expect_string, FunctionEnv, FunctionResult},
    Value,
};

fn binary(args: &[Value], op: impl FnOnce(&str, &str) -> Value) -> FunctionResult {
    let [a, b] = expect_args::<2>(args)?;
    Ok(Some(op(expect_string(a)?, expect_string(b)?)))
}

pub(crate) fn equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Bool(a == b))
}

pub(crate) fn not_equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::Bool(a != b))
}

pub(crate) fn add(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    binary(args, |a, b| Value::String(format!("{a}{b}")))
}
