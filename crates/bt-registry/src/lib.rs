use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use bt_core::{AttrValue, BtError};
use tracing::debug;

/// A constructed task-tree node. Execution semantics (ticking, status,
/// blackboards) live entirely in the embedding runtime library; the compiler
/// only needs names, child access, and a downcast hook.
pub trait Behaviour {
    fn name(&self) -> &str;

    fn children(&self) -> &[BtNode] {
        &[]
    }

    fn as_any(&self) -> &dyn Any;
}

pub type BtNode = Box<dyn Behaviour>;

impl std::fmt::Debug for dyn Behaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Behaviour")
            .field("name", &self.name())
            .field("children", &self.children().len())
            .finish()
    }
}

/// Which parameter of a function-style builder receives the compiled
/// children. Declared at registration time instead of being recovered by
/// signature introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSlot {
    None,
    Behaviour,
    Subtrees,
    Tasks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Leaf,
    Decorator,
    Composite,
    Function(ChildSlot),
}

/// Everything a registered constructor receives: the distinguished `name`,
/// the coerced attribute map, and the already-built children in document
/// order.
pub struct BuildContext {
    pub name: String,
    pub attributes: BTreeMap<String, AttrValue>,
    pub children: Vec<BtNode>,
}

impl BuildContext {
    /// The single child a decorator wraps. Wrong arity is the authoring
    /// error the constructor surfaces, not the compiler.
    pub fn sole_child(&mut self) -> Result<BtNode, BtError> {
        if self.children.len() != 1 {
            return Err(BtError::new(
                "FACTORY_ARITY_MISMATCH",
                format!(
                    "Node \"{}\" expects exactly one child, got {}.",
                    self.name,
                    self.children.len()
                ),
            ));
        }
        Ok(self
            .children
            .pop()
            .expect("length was checked to be exactly one"))
    }
}

pub type Constructor = Arc<dyn Fn(BuildContext) -> Result<BtNode, BtError> + Send + Sync>;

#[derive(Clone)]
pub struct NodeHandle {
    pub capability: Capability,
    pub constructor: Constructor,
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("capability", &self.capability)
            .field("constructor", &"<fn>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum RegistryEntry {
    Node(NodeHandle),
    Value(AttrValue),
}

#[derive(Clone, Debug)]
pub enum Resolution {
    /// Sentinel for the empty path; deliberately not an error.
    None,
    Entry {
        namespace: String,
        entry: RegistryEntry,
    },
}

/// The closed table of resolvable names, populated by the embedding
/// application at startup. Namespaces are keyed by their full dotted path,
/// mirroring how the runtime library's modules are addressed.
#[derive(Default)]
pub struct BehaviourRegistry {
    namespaces: BTreeMap<String, BTreeMap<String, RegistryEntry>>,
}

impl BehaviourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_node(
        &mut self,
        path: &str,
        capability: Capability,
        constructor: Constructor,
    ) -> Result<(), BtError> {
        self.register_entry(
            path,
            RegistryEntry::Node(NodeHandle {
                capability,
                constructor,
            }),
        )
    }

    pub fn register_value(&mut self, path: &str, value: AttrValue) -> Result<(), BtError> {
        self.register_entry(path, RegistryEntry::Value(value))
    }

    fn register_entry(&mut self, path: &str, entry: RegistryEntry) -> Result<(), BtError> {
        let Some((namespace, leaf)) = path.rsplit_once('.') else {
            return Err(BtError::new(
                "REGISTRY_PATH_INVALID",
                format!(
                    "Cannot register \"{}\": a handle path needs a dotted namespace.",
                    path
                ),
            ));
        };
        if namespace.is_empty() || leaf.is_empty() {
            return Err(BtError::new(
                "REGISTRY_PATH_INVALID",
                format!("Cannot register \"{}\": empty path segment.", path),
            ));
        }

        let table = self.namespaces.entry(namespace.to_string()).or_default();
        if table.contains_key(leaf) {
            return Err(BtError::new(
                "REGISTRY_PATH_CONFLICT",
                format!("\"{}\" is already registered.", path),
            ));
        }
        table.insert(leaf.to_string(), entry);
        Ok(())
    }

    /// Resolve a dotted path to a (namespace, entry) pair.
    ///
    /// The path is split at its last dot. If the prefix names a registered
    /// namespace the suffix is fetched from it directly; otherwise the
    /// prefix is itself resolved as a (shorter) path and the suffix is
    /// fetched as a member of whatever that produced. The fallback is what
    /// lets a path address nested non-namespace objects, e.g. a key of a
    /// registered map value.
    pub fn resolve(&self, path: &str) -> Result<Resolution, BtError> {
        debug!("resolving handle: {}", path);
        if path.is_empty() {
            return Ok(Resolution::None);
        }

        let Some((prefix, leaf)) = path.rsplit_once('.') else {
            return Err(BtError::new(
                "REGISTRY_PATH_INVALID",
                format!(
                    "Cannot parse handle \"{}\": missing namespace separator.",
                    path
                ),
            ));
        };

        if let Some(entries) = self.namespaces.get(prefix) {
            let entry = entries.get(leaf).ok_or_else(|| {
                BtError::new(
                    "REGISTRY_SYMBOL_UNRESOLVED",
                    format!("Namespace \"{}\" has no entry \"{}\".", prefix, leaf),
                )
            })?;
            return Ok(Resolution::Entry {
                namespace: prefix.to_string(),
                entry: entry.clone(),
            });
        }

        debug!("\"{}\" is not a namespace; resolving it as a handle", prefix);
        let inner = self.resolve(prefix).map_err(|_| {
            BtError::new(
                "REGISTRY_SYMBOL_UNRESOLVED",
                format!(
                    "Cannot resolve \"{}\": no namespace or handle provides \"{}\".",
                    path, prefix
                ),
            )
        })?;
        let Resolution::Entry { namespace, entry } = inner else {
            return Err(BtError::new(
                "REGISTRY_SYMBOL_UNRESOLVED",
                format!("Cannot resolve \"{}\": empty prefix.", path),
            ));
        };

        let member = member_of(&entry, leaf).ok_or_else(|| {
            BtError::new(
                "REGISTRY_SYMBOL_UNRESOLVED",
                format!("\"{}\" has no member \"{}\".", prefix, leaf),
            )
        })?;
        Ok(Resolution::Entry {
            namespace,
            entry: member,
        })
    }

    /// All constant values reachable under a root identifier, shaped as a
    /// nested map. Feeds the expression environment; node entries are
    /// invisible to expressions.
    pub fn value_namespace(&self, root: &str) -> Option<AttrValue> {
        let prefix = format!("{}.", root);
        let mut out = BTreeMap::new();
        let mut found = false;

        for (path, entries) in &self.namespaces {
            let segments: Vec<&str> = if path == root {
                Vec::new()
            } else if let Some(rest) = path.strip_prefix(&prefix) {
                rest.split('.').collect()
            } else {
                continue;
            };

            for (name, entry) in entries {
                if let RegistryEntry::Value(value) = entry {
                    insert_nested(&mut out, &segments, name, value.clone());
                    found = true;
                }
            }
        }

        found.then_some(AttrValue::Map(out))
    }
}

fn member_of(entry: &RegistryEntry, name: &str) -> Option<RegistryEntry> {
    match entry {
        RegistryEntry::Value(AttrValue::Map(map)) => {
            map.get(name).cloned().map(RegistryEntry::Value)
        }
        _ => None,
    }
}

fn insert_nested(
    map: &mut BTreeMap<String, AttrValue>,
    segments: &[&str],
    leaf: &str,
    value: AttrValue,
) {
    let Some((head, rest)) = segments.split_first() else {
        map.insert(leaf.to_string(), value);
        return;
    };
    let entry = map
        .entry((*head).to_string())
        .or_insert_with(|| AttrValue::Map(BTreeMap::new()));
    if let AttrValue::Map(inner) = entry {
        insert_nested(inner, rest, leaf, value);
    }
}
