//! Enum cases compile down to their raw values, so comparison only has to reject mixed kinds.

use crate::{
    function::{expect_args, FunctionEnv, FunctionError, FunctionResult},
    Value,
};

fn same_kind(args: &[Value]) -> Result<(&Value, &Value), FunctionError> {
    let [a, b] = expect_args::<2>(args)?;
    if a.kind() == b.kind() {
        Ok((a, b))
    } else {
        Err(FunctionError::EnumKindMismatch { left: a.clone(), right: b.clone() })
    }
}

pub(crate) fn equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let (a, b) = same_kind(args)?;
    Ok(Some(Value::Bool(a == b)))
}

pub(crate) fn not_equal_to(_: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    let (a, b) = same_kind(args)?;
    Ok(Some(Value::Bool(a != b)))
}
