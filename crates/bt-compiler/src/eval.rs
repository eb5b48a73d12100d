use std::collections::{BTreeMap, BTreeSet};

use bt_core::{AttrValue, BtError};
use bt_registry::BehaviourRegistry;
use regex::Regex;
use rhai::{Array, Dynamic, Engine, ImmutableString, Map, Scope, FLOAT, INT};
use tracing::debug;

use crate::coerce::coerce_literal;
use crate::scope::ArgScope;

/// Embedded-expression evaluator for `$( )` attribute values. One instance
/// per compile session; the environment for each evaluation is the active
/// argument scope plus the registry's value namespaces, nothing else.
pub(crate) struct ExprEvaluator<'r> {
    engine: Engine,
    registry: &'r BehaviourRegistry,
}

impl<'r> ExprEvaluator<'r> {
    pub(crate) fn new(registry: &'r BehaviourRegistry) -> Self {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        Self { engine, registry }
    }

    pub(crate) fn eval(&self, expr: &str, scope: &ArgScope<'_>) -> Result<AttrValue, BtError> {
        let mut rhai_scope = Scope::new();
        for ident in root_identifiers(expr) {
            if let Some(bound) = scope.lookup(&ident) {
                rhai_scope.push_dynamic(ident.clone(), attr_value_to_dynamic(&coerce_literal(bound))?);
            } else if let Some(values) = self.registry.value_namespace(&ident) {
                rhai_scope.push_dynamic(ident.clone(), attr_value_to_dynamic(&values)?);
            } else {
                debug!("assuming \"{}\" is a local variable", ident);
            }
        }

        let wrapped = format!("({})", expr);
        let result = self
            .engine
            .eval_with_scope::<Dynamic>(&mut rhai_scope, &wrapped)
            .map_err(|error| {
                BtError::new(
                    "EXPR_EVAL_ERROR",
                    format!("Evaluation of \"{}\" failed: {}", expr, error),
                )
            })?;
        dynamic_to_attr_value(result)
    }
}

/// Candidate root identifiers of an expression: names not preceded by a dot
/// (member accesses belong to whatever root they hang off). Quoted string
/// contents are masked out first.
fn root_identifiers(expr: &str) -> Vec<String> {
    let sanitized = mask_string_literals(expr);
    let ident_regex = Regex::new(r"(?:^|[^.\w])([A-Za-z_][A-Za-z0-9_]*)")
        .expect("identifier regex must compile");

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for captures in ident_regex.captures_iter(&sanitized) {
        let ident = captures
            .get(1)
            .expect("capture group 1 must exist for each match")
            .as_str();
        if seen.insert(ident.to_string()) {
            out.push(ident.to_string());
        }
    }
    out
}

fn mask_string_literals(source: &str) -> String {
    let double_quote_regex =
        Regex::new(r#""(?:\\.|[^"\\])*""#).expect("double quote regex must compile");
    let single_quote_regex =
        Regex::new(r#"'(?:\\.|[^'\\])*'"#).expect("single quote regex must compile");

    let masked = double_quote_regex.replace_all(source, " ");
    single_quote_regex.replace_all(&masked, " ").into_owned()
}

pub(crate) fn attr_value_to_dynamic(value: &AttrValue) -> Result<Dynamic, BtError> {
    match value {
        AttrValue::Bool(value) => Ok(Dynamic::from_bool(*value)),
        AttrValue::Int(value) => Ok(Dynamic::from_int(*value as INT)),
        AttrValue::Float(value) => Ok(Dynamic::from_float(*value as FLOAT)),
        AttrValue::Str(value) => Ok(Dynamic::from(value.clone())),
        AttrValue::List(values) => {
            let mut array = Array::new();
            for value in values {
                array.push(attr_value_to_dynamic(value)?);
            }
            Ok(Dynamic::from_array(array))
        }
        AttrValue::Map(values) => {
            let mut map = Map::new();
            for (key, value) in values {
                map.insert(key.clone().into(), attr_value_to_dynamic(value)?);
            }
            Ok(Dynamic::from_map(map))
        }
        AttrValue::Policy(_) => Err(BtError::new(
            "EXPR_EVAL_ERROR",
            "Policy values cannot enter an expression environment.",
        )),
    }
}

pub(crate) fn dynamic_to_attr_value(value: Dynamic) -> Result<AttrValue, BtError> {
    if value.is::<bool>() {
        return Ok(AttrValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(AttrValue::Int(value.cast::<INT>()));
    }
    if value.is::<FLOAT>() {
        return Ok(AttrValue::Float(value.cast::<FLOAT>()));
    }
    if value.is::<ImmutableString>() {
        return Ok(AttrValue::Str(value.cast::<ImmutableString>().to_string()));
    }
    if value.is::<Array>() {
        let array = value.cast::<Array>();
        let mut out = Vec::with_capacity(array.len());
        for item in array {
            out.push(dynamic_to_attr_value(item)?);
        }
        return Ok(AttrValue::List(out));
    }
    if value.is::<Map>() {
        let map = value.cast::<Map>();
        let mut out = BTreeMap::new();
        for (key, value) in map {
            out.insert(key.to_string(), dynamic_to_attr_value(value)?);
        }
        return Ok(AttrValue::Map(out));
    }

    Err(BtError::new(
        "EXPR_EVAL_ERROR",
        "Expression produced an unsupported value type.",
    ))
}
