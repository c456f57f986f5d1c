use crate::{
    function::{expect_args, expect_string, FunctionEnv, FunctionResult},
    Value, VISITING_PREFIX,
};

fn visit_count(env: FunctionEnv<'_>, args: &[Value]) -> Result<f64, crate::FunctionError> {
    let [node_name] = expect_args::<1>(args)?;
    let node_name = expect_string(node_name)?;
    Ok(env.storage.number(&format!("{VISITING_PREFIX}{node_name}")).unwrap_or(0.0))
}

pub(crate) fn visited(env: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    Ok(Some(Value::Bool(visit_count(env, args)? > 0.0)))
}

pub(crate) fn visited_count(env: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
    Ok(Some(Value::Number(visit_count(env, args)?)))
}
