//! Validate tool call arguments against declared parameters before execution.

use serde_json::Value;

use crate::tool::{ParamType, Parameter, ToolArgs};

/// Check `args` against `params` and return the (possibly coerced) arguments.
///
/// For each declared parameter in order: presence of required values, then the
/// JSON type, then the custom validator. The first violation is returned as the
/// failure message. Only declared parameters reach the tool; anything else
/// the model sent is dropped.
pub fn validate_arguments(params: &[Parameter], mut args: ToolArgs) -> Result<ToolArgs, String> {
    let mut checked = ToolArgs::new();
    for param in params {
        let Some(mut value) = args.remove(&param.name) else {
            if param.required {
                return Err(format!("missing required parameter: {}", param.name));
            }
            continue;
        };

        if value.is_null() && !param.required {
            checked.insert(param.name.clone(), value);
            continue;
        }

        coerce(&mut value, param.kind);
        if !matches_type(&value, param.kind) {
            return Err(format!(
                "invalid type for {}: expected {}, got {}",
                param.name,
                param.kind,
                json_type_name(&value)
            ));
        }

        if let Some(validator) = &param.validator {
            validator(&value).map_err(|e| format!("validation failed for {}: {e}", param.name))?;
        }
        checked.insert(param.name.clone(), value);
    }
    Ok(checked)
}

/// Integral floats are accepted for integer parameters.
fn coerce(value: &mut Value, kind: ParamType) {
    if kind == ParamType::Integer
        && let Some(f) = value.as_f64()
        && !value.is_i64()
        && !value.is_u64()
        && f.fract() == 0.0
        && f.abs() < i64::MAX as f64
    {
        *value = Value::from(f as i64);
    }
}

fn matches_type(value: &Value, kind: ParamType) -> bool {
    match kind {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Object => value.is_object(),
        ParamType::Array => value.is_array(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
