use std::collections::BTreeMap;

use bt_core::BtError;
use bt_parser::XmlElementNode;
use tracing::debug;

use crate::coerce::{arg_ref_name, is_arg_ref};

/// Lexically chained argument bindings. A fresh scope is layered on at each
/// subtree inclusion; lookups walk the chain innermost-first, so the
/// immediately enclosing inclusion's binding shadows any outer one.
pub(crate) struct ArgScope<'a> {
    bindings: BTreeMap<String, String>,
    parent: Option<&'a ArgScope<'a>>,
}

impl<'a> ArgScope<'a> {
    pub(crate) fn root() -> ArgScope<'static> {
        ArgScope {
            bindings: BTreeMap::new(),
            parent: None,
        }
    }

    pub(crate) fn child(bindings: BTreeMap<String, String>, parent: &'a ArgScope<'a>) -> Self {
        Self {
            bindings,
            parent: Some(parent),
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.bindings.get(name) {
            return Some(value.as_str());
        }
        self.parent.and_then(|parent| parent.lookup(name))
    }

    /// Rewrite every attribute value that is an argument reference with its
    /// bound value, in place. An unbound reference is always an error, never
    /// a silent no-op.
    pub(crate) fn substitute(&self, element: &mut XmlElementNode) -> Result<(), BtError> {
        for (attr_name, value) in element.attributes.iter_mut() {
            if !is_arg_ref(value) {
                continue;
            }
            let arg_name = arg_ref_name(value);
            match self.lookup(arg_name) {
                Some(bound) => {
                    debug!("substituting {} with {}", value, bound);
                    *value = bound.to_string();
                }
                None => {
                    return Err(BtError::with_span(
                        "ARG_UNDEFINED",
                        format!(
                            "Argument \"{}\" referenced by attribute \"{}\" on <{}> is not bound in the active scope.",
                            arg_name, attr_name, element.tag
                        ),
                        element.location.clone(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bt_core::SourceSpan;

    use super::*;

    fn element(attributes: &[(&str, &str)]) -> XmlElementNode {
        XmlElementNode {
            tag: "behaviours.Periodic".to_string(),
            attributes: attributes
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
            children: Vec::new(),
            location: SourceSpan::synthetic(),
        }
    }

    #[test]
    fn lookup_walks_the_chain_innermost_first() {
        let root = ArgScope::root();
        let outer = ArgScope::child(
            BTreeMap::from([
                ("period".to_string(), "5".to_string()),
                ("topic".to_string(), "/cmd_vel".to_string()),
            ]),
            &root,
        );
        let inner = ArgScope::child(
            BTreeMap::from([("period".to_string(), "2".to_string())]),
            &outer,
        );

        assert_eq!(inner.lookup("period"), Some("2"));
        assert_eq!(inner.lookup("topic"), Some("/cmd_vel"));
        assert_eq!(inner.lookup("missing"), None);
        assert_eq!(outer.lookup("period"), Some("5"));
    }

    #[test]
    fn substitute_rewrites_references_and_leaves_other_values_alone() {
        let root = ArgScope::root();
        let scope = ArgScope::child(
            BTreeMap::from([("period".to_string(), "2".to_string())]),
            &root,
        );
        let mut node = element(&[("name", "Flip"), ("n", "${period}"), ("blocking", "true")]);

        scope.substitute(&mut node).expect("substitution should pass");
        assert_eq!(node.attributes.get("n"), Some(&"2".to_string()));
        assert_eq!(node.attributes.get("name"), Some(&"Flip".to_string()));
        assert_eq!(node.attributes.get("blocking"), Some(&"true".to_string()));
    }

    #[test]
    fn substitute_fails_on_unbound_reference_even_with_empty_scope() {
        let scope = ArgScope::root();
        let mut node = element(&[("n", "${period}")]);

        let error = scope
            .substitute(&mut node)
            .expect_err("unbound reference should fail");
        assert_eq!(error.code, "ARG_UNDEFINED");
        assert!(error.message.contains("period"));
        assert!(error.message.contains("behaviours.Periodic"));
    }
}
