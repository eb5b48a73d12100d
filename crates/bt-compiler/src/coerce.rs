use bt_core::{AttrValue, BtError};
use tracing::debug;

use crate::eval::ExprEvaluator;
use crate::scope::ArgScope;

pub(crate) fn is_code(value: &str) -> bool {
    value.len() >= 3 && value.starts_with("$(") && value.ends_with(')')
}

pub(crate) fn is_arg_ref(value: &str) -> bool {
    value.len() >= 3 && value.starts_with("${") && value.ends_with('}')
}

pub(crate) fn code_expr(value: &str) -> &str {
    &value[2..value.len() - 1]
}

pub(crate) fn arg_ref_name(value: &str) -> &str {
    &value[2..value.len() - 1]
}

fn is_integer(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}

/// The literal subset of coercion: integer, float, or string. Used both as
/// the tail of `coerce` and to bridge argument bindings into expression
/// environments without re-entering evaluation.
pub(crate) fn coerce_literal(raw: &str) -> AttrValue {
    let value = raw.trim();
    if is_integer(value) {
        // digit strings wider than i64 read better as floats than as errors
        if let Ok(parsed) = value.parse::<i64>() {
            return AttrValue::Int(parsed);
        }
    }
    if let Ok(parsed) = value.parse::<f64>() {
        return AttrValue::Float(parsed);
    }
    AttrValue::Str(value.to_string())
}

/// Classify and convert one raw attribute string, in priority order:
/// integer literal, float literal, `$( )` code, `${ }` argument reference,
/// plain trimmed string.
pub(crate) fn coerce(
    raw: &str,
    scope: &ArgScope<'_>,
    evaluator: &ExprEvaluator<'_>,
) -> Result<AttrValue, BtError> {
    let value = raw.trim();

    if is_integer(value) {
        if let Ok(parsed) = value.parse::<i64>() {
            return Ok(AttrValue::Int(parsed));
        }
    }
    if let Ok(parsed) = value.parse::<f64>() {
        return Ok(AttrValue::Float(parsed));
    }
    if is_code(value) {
        debug!("evaluating attribute code: {}", value);
        return evaluator.eval(code_expr(value), scope);
    }
    if is_arg_ref(value) {
        let name = arg_ref_name(value);
        return match scope.lookup(name) {
            Some(bound) => Ok(coerce_literal(bound)),
            None => Err(BtError::new(
                "ARG_UNDEFINED",
                format!("Argument \"{}\" is not bound in the active scope.", name),
            )),
        };
    }

    Ok(AttrValue::Str(value.to_string()))
}
