use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Child-aggregation policy handed to parallel composites. Constructors
/// expect a structured policy rather than the raw `synchronise` flag some
/// documents still carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ParallelPolicy {
    SuccessOnAll { synchronise: bool },
    SuccessOnOne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Policy(ParallelPolicy),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view over both integer and float values.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Policy(_) => "policy",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variants() {
        assert_eq!(AttrValue::Int(2).as_int(), Some(2));
        assert_eq!(AttrValue::Int(2).as_float(), None);
        assert_eq!(AttrValue::Int(2).as_number(), Some(2.0));
        assert_eq!(AttrValue::Float(30.0).as_number(), Some(30.0));
        assert_eq!(AttrValue::Str("idle".to_string()).as_str(), Some("idle"));
        assert_eq!(AttrValue::Bool(true).as_bool(), Some(true));
        assert_eq!(AttrValue::Str("idle".to_string()).as_int(), None);
    }

    #[test]
    fn type_names_cover_every_variant() {
        assert_eq!(AttrValue::Int(1).type_name(), "integer");
        assert_eq!(AttrValue::Float(1.0).type_name(), "float");
        assert_eq!(AttrValue::Bool(false).type_name(), "boolean");
        assert_eq!(AttrValue::Str(String::new()).type_name(), "string");
        assert_eq!(AttrValue::List(Vec::new()).type_name(), "list");
        assert_eq!(AttrValue::Map(BTreeMap::new()).type_name(), "map");
        assert_eq!(
            AttrValue::Policy(ParallelPolicy::SuccessOnOne).type_name(),
            "policy"
        );
    }

    #[test]
    fn values_serialize_without_enum_tags() {
        let value = AttrValue::List(vec![
            AttrValue::Int(2),
            AttrValue::Float(0.5),
            AttrValue::Str("ok".to_string()),
        ]);
        let json = serde_json::to_string(&value).expect("value should serialize");
        assert_eq!(json, r#"[2,0.5,"ok"]"#);
    }

    #[test]
    fn policy_serializes_with_its_tag() {
        let value = AttrValue::Policy(ParallelPolicy::SuccessOnAll { synchronise: true });
        let json = serde_json::to_string(&value).expect("policy should serialize");
        assert_eq!(json, r#"{"policy":"success_on_all","synchronise":true}"#);
    }
}
