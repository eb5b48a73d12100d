use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use bt_core::{AttrValue, BtError};
use bt_registry::{
    Behaviour, BehaviourRegistry, BtNode, BuildContext, Capability, ChildSlot, Constructor,
};

/// Capture-everything node used by the test registry: assertions inspect
/// the name, the coerced attributes, and the attached children.
pub(crate) struct ProbeNode {
    pub(crate) type_label: &'static str,
    pub(crate) name: String,
    pub(crate) attributes: BTreeMap<String, AttrValue>,
    pub(crate) children: Vec<BtNode>,
}

impl Behaviour for ProbeNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[BtNode] {
        &self.children
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn probe(node: &BtNode) -> &ProbeNode {
    node.as_any()
        .downcast_ref::<ProbeNode>()
        .expect("demo registry nodes are always probes")
}

fn capture(type_label: &'static str) -> Constructor {
    Arc::new(move |ctx: BuildContext| -> Result<BtNode, BtError> {
        Ok(Box::new(ProbeNode {
            type_label,
            name: ctx.name,
            attributes: ctx.attributes,
            children: ctx.children,
        }))
    })
}

fn capture_decorator(type_label: &'static str) -> Constructor {
    Arc::new(move |mut ctx: BuildContext| -> Result<BtNode, BtError> {
        let child = ctx.sole_child()?;
        Ok(Box::new(ProbeNode {
            type_label,
            name: ctx.name,
            attributes: ctx.attributes,
            children: vec![child],
        }))
    })
}

/// A registry shaped like a small runtime library: behaviours, composites,
/// decorators, function-style idioms, and a constants namespace.
pub(crate) fn demo_registry() -> BehaviourRegistry {
    let mut registry = BehaviourRegistry::new();

    registry
        .register_node("demo.behaviours.Running", Capability::Leaf, capture("Running"))
        .expect("registration should pass");
    registry
        .register_node(
            "demo.behaviours.Periodic",
            Capability::Leaf,
            capture("Periodic"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.composites.Sequence",
            Capability::Composite,
            capture("Sequence"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.composites.Selector",
            Capability::Composite,
            capture("Selector"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.composites.Parallel",
            Capability::Composite,
            capture("Parallel"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.decorators.Inverter",
            Capability::Decorator,
            capture_decorator("Inverter"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.decorators.Timeout",
            Capability::Decorator,
            capture_decorator("Timeout"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.idioms.oneshot",
            Capability::Function(ChildSlot::Behaviour),
            capture("oneshot"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.idioms.either_or",
            Capability::Function(ChildSlot::Subtrees),
            capture("either_or"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.idioms.pick_up_where_you_left_off",
            Capability::Function(ChildSlot::Tasks),
            capture("pick_up_where_you_left_off"),
        )
        .expect("registration should pass");
    registry
        .register_node(
            "demo.idioms.announce",
            Capability::Function(ChildSlot::None),
            capture("announce"),
        )
        .expect("registration should pass");

    registry
        .register_value("demo.common.MAX_SPEED", AttrValue::Float(1.5))
        .expect("registration should pass");
    registry
        .register_value("demo.common.RETRIES", AttrValue::Int(3))
        .expect("registration should pass");
    registry
        .register_value(
            "demo.common.Status",
            AttrValue::Map(BTreeMap::from([
                (
                    "SUCCESS".to_string(),
                    AttrValue::Str("SUCCESS".to_string()),
                ),
                (
                    "FAILURE".to_string(),
                    AttrValue::Str("FAILURE".to_string()),
                ),
            ])),
        )
        .expect("registration should pass");

    registry
}
