//! The variable-lookup trie.
//!
//! Scope paths track the *variable* scope: the path-stack segments with
//! step segments removed. The trie holds `name → ExprId` bindings;
//! expressions themselves live in the content-addressed registry, so
//! shadowing and deduplication compose without cross-references.

use opal_core::id::ExprId;
use std::collections::{HashMap, HashSet};

/// Path of the root scope.
pub(crate) const ROOT_SCOPE: &str = "root";

struct ScopeNode {
    parent: String,
    vars: HashMap<String, ExprId>,
}

/// Tree of scopes rooted at `"root"`. Scopes are created lazily on
/// first declaration at a path and destroyed only with the vault.
pub(crate) struct ScopeTable {
    nodes: HashMap<String, ScopeNode>,
}

impl ScopeTable {
    pub(crate) fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_SCOPE.to_owned(),
            ScopeNode {
                parent: String::new(),
                vars: HashMap::new(),
            },
        );
        Self { nodes }
    }

    /// Create any missing nodes along `chain` (ordered root-first
    /// cumulative paths, e.g. `["root", "root/@retry[0]"]`).
    pub(crate) fn ensure_chain(&mut self, chain: &[String]) {
        let mut parent = String::new();
        for path in chain {
            self.nodes.entry(path.clone()).or_insert_with(|| ScopeNode {
                parent: parent.clone(),
                vars: HashMap::new(),
            });
            parent = path.clone();
        }
    }

    /// Bind `name` in the scope at `path`. The scope must exist.
    pub(crate) fn bind(&mut self, path: &str, name: &str, id: ExprId) {
        let node = self
            .nodes
            .get_mut(path)
            .unwrap_or_else(|| panic!("invariant violation: binding into unknown scope {path}"));
        node.vars.insert(name.to_owned(), id);
    }

    /// Walk from `start` toward the root, returning the first binding
    /// of `name`.
    ///
    /// # Panics
    ///
    /// Revisiting a scope during the walk means the tree has a cycle —
    /// a fatal invariant violation.
    pub(crate) fn lookup(&self, start: &str, name: &str) -> Option<ExprId> {
        let mut visited = HashSet::new();
        let mut current = start.to_owned();
        while let Some(node) = self.nodes.get(&current) {
            if !visited.insert(current.clone()) {
                panic!("invariant violation: scope cycle at {current}");
            }
            if let Some(id) = node.vars.get(name) {
                return Some(id.clone());
            }
            if node.parent.is_empty() {
                return None;
            }
            current = node.parent.clone();
        }
        None
    }
}
