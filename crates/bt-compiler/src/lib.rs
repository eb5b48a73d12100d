use std::collections::BTreeMap;

use bt_core::BtError;
use bt_parser::{parse_xml_document, XmlElementNode};
use bt_registry::{BehaviourRegistry, BtNode};
use tracing::{debug, warn};

mod coerce;
mod eval;
mod factory;
mod scope;
mod sources;
#[cfg(test)]
mod test_support;

pub use sources::{compile_tree_from_dir, read_tree_sources_from_dir};

use crate::coerce::coerce;
use crate::eval::ExprEvaluator;
use crate::factory::create_node;
use crate::scope::ArgScope;
use crate::sources::{normalize_virtual_path, resolve_include_path};

/// Reserved inclusion marker; matched case-insensitively.
pub const SUBTREE_TAG: &str = "subtree";
const ARG_TAG: &str = "arg";

const INLINE_DOCUMENT_PATH: &str = "inline-document.xml";

/// Compile the entry document of a virtual source map (path -> XML text)
/// into a task tree. No partial results: the first failure aborts the whole
/// compilation.
pub fn compile_tree_from_xml_map(
    sources: &BTreeMap<String, String>,
    entry: &str,
    registry: &BehaviourRegistry,
) -> Result<BtNode, BtError> {
    TreeCompiler::new(sources.clone(), registry).compile(entry)
}

/// Compile a single inline document. Inclusions have no source set to
/// resolve against and fail with `INCLUDE_NOT_FOUND`.
pub fn compile_tree_from_str(
    source: &str,
    registry: &BehaviourRegistry,
) -> Result<BtNode, BtError> {
    let sources = BTreeMap::from([(INLINE_DOCUMENT_PATH.to_string(), source.to_string())]);
    TreeCompiler::new(sources, registry).compile(INLINE_DOCUMENT_PATH)
}

/// One compilation session: the source set, the capability registry, and an
/// expression evaluator scoped to this session.
pub struct TreeCompiler<'r> {
    sources: BTreeMap<String, String>,
    registry: &'r BehaviourRegistry,
    evaluator: ExprEvaluator<'r>,
}

impl<'r> TreeCompiler<'r> {
    pub fn new(sources: BTreeMap<String, String>, registry: &'r BehaviourRegistry) -> Self {
        let sources = sources
            .into_iter()
            .map(|(path, text)| (normalize_virtual_path(&path), text))
            .collect();
        Self {
            sources,
            registry,
            evaluator: ExprEvaluator::new(registry),
        }
    }

    pub fn compile(&self, entry: &str) -> Result<BtNode, BtError> {
        let entry_path = normalize_virtual_path(entry);
        let document = self.load_document(&entry_path).map_err(|error| {
            if error.code == "INCLUDE_NOT_FOUND" {
                BtError::new(
                    "ENTRY_NOT_FOUND",
                    format!("Entry document \"{}\" is not in the source set.", entry_path),
                )
            } else {
                error
            }
        })?;

        let root_scope = ArgScope::root();
        Ok(self
            .build_node(Some(document), &root_scope, &entry_path)?
            .expect("a present root element always yields a node"))
    }

    fn load_document(&self, path: &str) -> Result<XmlElementNode, BtError> {
        let source = self.sources.get(path).ok_or_else(|| {
            BtError::new(
                "INCLUDE_NOT_FOUND",
                format!("Document \"{}\" is not in the source set.", path),
            )
        })?;
        Ok(parse_xml_document(source)?.root)
    }

    fn build_node(
        &self,
        element: Option<XmlElementNode>,
        scope: &ArgScope<'_>,
        document_path: &str,
    ) -> Result<Option<BtNode>, BtError> {
        let Some(mut element) = element else {
            warn!("received an absent element; this shouldn't happen");
            return Ok(None);
        };

        scope.substitute(&mut element)?;

        if element.tag.eq_ignore_ascii_case(SUBTREE_TAG) {
            return self.build_subtree(element, scope, document_path).map(Some);
        }

        let mut children = Vec::new();
        for child in std::mem::take(&mut element.children) {
            if let Some(node) = self.build_node(Some(child), scope, document_path)? {
                children.push(node);
            }
        }

        create_node(self.registry, &self.evaluator, scope, element, children).map(Some)
    }

    fn build_subtree(
        &self,
        mut element: XmlElementNode,
        scope: &ArgScope<'_>,
        document_path: &str,
    ) -> Result<BtNode, BtError> {
        let subtree_name = get_optional_attr(&element, "name").unwrap_or_default();
        let include_raw = get_required_non_empty_attr(&element, "include")?;
        let include_value = coerce(&include_raw, scope, &self.evaluator)?;
        let Some(include) = include_value.as_str() else {
            return Err(BtError::with_span(
                "INCLUDE_PATH_INVALID",
                format!(
                    "Subtree \"{}\": include must evaluate to a string path, got {}.",
                    subtree_name,
                    include_value.type_name()
                ),
                element.location.clone(),
            ));
        };
        let include = include.to_string();

        let mut bindings = BTreeMap::new();
        for mut child in std::mem::take(&mut element.children) {
            if !child.tag.eq_ignore_ascii_case(ARG_TAG) {
                return Err(BtError::with_span(
                    "XML_SUBTREE_CHILD_INVALID",
                    format!(
                        "Unexpected tag <{}> in subtree \"{}\"; only <arg> is allowed.",
                        child.tag, subtree_name
                    ),
                    child.location.clone(),
                ));
            }
            // the declaration's own value is substituted against the
            // including scope before it is bound in the new one
            scope.substitute(&mut child)?;
            let name = get_required_non_empty_attr(&child, "name")?;
            let value = get_required_attr(&child, "value")?;
            debug!("subtree \"{}\" binds {} = {}", subtree_name, name, value);
            bindings.insert(name, value);
        }

        let include_path = resolve_include_path(document_path, &include);
        let included_root = self.load_document(&include_path).map_err(|error| {
            BtError::with_span(
                error.code,
                format!("Subtree \"{}\": {}", subtree_name, error.message),
                element.location.clone(),
            )
        })?;

        debug!("expanding subtree \"{}\" from {}", subtree_name, include_path);
        let nested = ArgScope::child(bindings, scope);
        let node = self.build_node(Some(included_root), &nested, &include_path)?;
        Ok(node.expect("a present root element always yields a node"))
    }
}

fn get_optional_attr(node: &XmlElementNode, name: &str) -> Option<String> {
    node.attributes.get(name).cloned()
}

fn get_required_attr(node: &XmlElementNode, name: &str) -> Result<String, BtError> {
    node.attributes.get(name).cloned().ok_or_else(|| {
        BtError::with_span(
            "XML_MISSING_ATTR",
            format!("Missing required attribute \"{}\" on <{}>.", name, node.tag),
            node.location.clone(),
        )
    })
}

fn get_required_non_empty_attr(node: &XmlElementNode, name: &str) -> Result<String, BtError> {
    let raw = get_required_attr(node, name)?;
    if raw.trim().is_empty() {
        return Err(BtError::with_span(
            "XML_EMPTY_ATTR",
            format!("Attribute \"{}\" on <{}> cannot be empty.", name, node.tag),
            node.location.clone(),
        ));
    }
    Ok(raw)
}
