use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bt_core::BtError;
use bt_registry::{BehaviourRegistry, BtNode};
use walkdir::WalkDir;

use crate::TreeCompiler;

/// Scan a directory for `.xml` tree documents and compile `entry` (a path
/// relative to `dir`) against them.
pub fn compile_tree_from_dir(
    dir: &Path,
    entry: &str,
    registry: &BehaviourRegistry,
) -> Result<BtNode, BtError> {
    let sources = read_tree_sources_from_dir(dir)?;
    TreeCompiler::new(sources, registry).compile(entry)
}

pub fn read_tree_sources_from_dir(dir: &Path) -> Result<BTreeMap<String, String>, BtError> {
    if !dir.is_dir() {
        return Err(BtError::new(
            "SOURCE_DIR_NOT_FOUND",
            format!("Tree directory does not exist: {}", dir.display()),
        ));
    }

    let mut sources = BTreeMap::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("xml") {
            continue;
        }

        let relative = path
            .strip_prefix(dir)
            .expect("walked paths are always under the scanned root")
            .to_string_lossy()
            .replace('\\', "/");

        let content = fs::read_to_string(path).map_err(|error| {
            BtError::new(
                "SOURCE_READ_ERROR",
                format!("Failed to read {}: {}", path.display(), error),
            )
        })?;
        sources.insert(relative, content);
    }

    if sources.is_empty() {
        return Err(BtError::new(
            "SOURCE_EMPTY",
            format!("No .xml tree documents under {}", dir.display()),
        ));
    }

    Ok(sources)
}

/// Resolve an `include` reference relative to the including document.
pub(crate) fn resolve_include_path(current_path: &str, include: &str) -> String {
    let parent = match Path::new(current_path).parent() {
        Some(parent) => parent,
        None => Path::new(""),
    };
    let joined = if include.starts_with('/') {
        PathBuf::from(include)
    } else {
        parent.join(include)
    };
    normalize_virtual_path(joined.to_string_lossy().as_ref())
}

pub(crate) fn normalize_virtual_path(path: &str) -> String {
    let mut stack: Vec<String> = Vec::new();
    for part in path.replace('\\', "/").split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            if !stack.is_empty() {
                stack.pop();
            }
            continue;
        }
        stack.push(part.to_string());
    }
    stack.join("/")
}
