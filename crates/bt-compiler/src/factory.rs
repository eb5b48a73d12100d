use std::collections::BTreeMap;

use bt_core::{AttrValue, BtError, ParallelPolicy, SourceSpan};
use bt_parser::XmlElementNode;
use bt_registry::{
    BehaviourRegistry, BtNode, BuildContext, Capability, ChildSlot, RegistryEntry, Resolution,
};
use tracing::debug;

use crate::coerce::coerce;
use crate::eval::ExprEvaluator;
use crate::scope::ArgScope;

/// Construct one node: resolve the tag, pull out the mandatory `name`,
/// coerce the remaining attributes, and dispatch on the handle's capability.
pub(crate) fn create_node(
    registry: &BehaviourRegistry,
    evaluator: &ExprEvaluator<'_>,
    scope: &ArgScope<'_>,
    element: XmlElementNode,
    children: Vec<BtNode>,
) -> Result<BtNode, BtError> {
    let XmlElementNode {
        tag,
        mut attributes,
        location,
        ..
    } = element;

    let resolution = registry.resolve(&tag)?;
    let Resolution::Entry { entry, .. } = resolution else {
        return Err(BtError::with_span(
            "REGISTRY_TYPE_UNEXPECTED",
            format!("Tag \"{}\" does not name a constructible node type.", tag),
            location,
        ));
    };
    let RegistryEntry::Node(handle) = entry else {
        return Err(BtError::with_span(
            "REGISTRY_TYPE_UNEXPECTED",
            format!(
                "Tag \"{}\" resolved to a constant, not a constructible node type.",
                tag
            ),
            location,
        ));
    };

    let Some(name) = attributes.remove("name") else {
        return Err(BtError::with_span(
            "XML_MISSING_ATTR",
            format!("Missing required attribute \"name\" on <{}>.", tag),
            location,
        ));
    };

    let mut coerced = BTreeMap::new();
    for (key, raw) in attributes {
        let value = coerce(&raw, scope, evaluator).map_err(|error| {
            BtError::with_span(
                error.code,
                format!(
                    "Attribute \"{}\"=\"{}\" on <{}>: {}",
                    key, raw, tag, error.message
                ),
                location.clone(),
            )
        })?;
        coerced.insert(key, value);
    }

    apply_parallel_policy(&tag, handle.capability, &mut coerced);

    if let Capability::Function(slot) = handle.capability {
        check_function_arity(&tag, slot, children.len(), &location)?;
    }

    debug!(
        "constructing <{}> name={} with {} children",
        tag,
        name,
        children.len()
    );
    (handle.constructor)(BuildContext {
        name,
        attributes: coerced,
        children,
    })
}

/// Legacy adaptation: parallel composites take a structured policy, but
/// older documents carry a bare `synchronise` flag. Keyed narrowly on the
/// attribute name and the target capability.
fn apply_parallel_policy(
    tag: &str,
    capability: Capability,
    attributes: &mut BTreeMap<String, AttrValue>,
) {
    if capability != Capability::Composite {
        return;
    }
    let Some(value) = attributes.remove("synchronise") else {
        return;
    };
    let synchronise = match &value {
        AttrValue::Bool(flag) => *flag,
        AttrValue::Str(text) => text == "True" || text == "true",
        _ => false,
    };
    debug!("translating synchronise={} on <{}> into a policy", synchronise, tag);
    attributes.insert(
        "policy".to_string(),
        AttrValue::Policy(ParallelPolicy::SuccessOnAll { synchronise }),
    );
}

fn check_function_arity(
    tag: &str,
    slot: ChildSlot,
    supplied: usize,
    location: &SourceSpan,
) -> Result<(), BtError> {
    let accepted = match slot {
        ChildSlot::Behaviour => supplied == 1,
        ChildSlot::Subtrees | ChildSlot::Tasks => true,
        ChildSlot::None => supplied == 0,
    };
    if accepted {
        return Ok(());
    }
    Err(BtError::with_span(
        "FACTORY_ARITY_MISMATCH",
        format!(
            "Unknown node type \"{}\": {} children supplied but the registered function does not take them.",
            tag, supplied
        ),
        location.clone(),
    ))
}
