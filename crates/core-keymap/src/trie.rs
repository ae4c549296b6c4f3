//! Per-mode key trie.
//!
//! Nodes live in an arena addressed by index; the root is always index 0.
//! Edges are kept sorted by key so lookups are a binary search and listing
//! walks bindings in lexical order. Nodes pruned by an unmap are recycled
//! through a free list.

use smallvec::SmallVec;
use tracing::trace;

use crate::{KeyInfo, KeysInfo};

/// Native key handler. Receives the host, the parsed count/register/parameter
/// of this chord and the shared dispatch description. Negative return values
/// are handler-reported errors and are surfaced verbatim.
pub type KeyHandler<H> = fn(&mut H, KeyInfo, &mut KeysInfo) -> i32;

/// What a terminal node runs.
pub enum KeyCmd<H> {
    Native(KeyHandler<H>),
    /// Replacement text re-dispatched as if typed (user mapping).
    User(String),
}

impl<H> Clone for KeyCmd<H> {
    fn clone(&self) -> Self {
        match self {
            KeyCmd::Native(f) => KeyCmd::Native(*f),
            KeyCmd::User(rhs) => KeyCmd::User(rhs.clone()),
        }
    }
}

impl<H> std::fmt::Debug for KeyCmd<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyCmd::Native(_) => f.write_str("Native(..)"),
            KeyCmd::User(rhs) => f.debug_tuple("User").field(rhs).finish(),
        }
    }
}

/// What a binding expects after its own keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowedBy {
    #[default]
    None,
    /// Exactly one more key, captured verbatim as `KeyInfo::multi`.
    Multikey,
    /// A selector chord (operator awaiting a motion).
    Selector,
}

/// Whether a binding may be used as the target of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorRole {
    #[default]
    NotASelector,
    Selector,
    SelectorOnly,
}

/// Terminal descriptor attached to a trie node.
#[derive(Debug)]
pub struct KeyBinding<H> {
    pub cmd: KeyCmd<H>,
    pub followed: FollowedBy,
    pub role: SelectorRole,
    /// Native bindings only: whether a user mapping may shadow this one.
    pub remappable: bool,
    shadowed: Option<Box<KeyBinding<H>>>,
}

impl<H> KeyBinding<H> {
    pub fn native(handler: KeyHandler<H>) -> Self {
        Self {
            cmd: KeyCmd::Native(handler),
            followed: FollowedBy::None,
            role: SelectorRole::NotASelector,
            remappable: false,
            shadowed: None,
        }
    }

    pub fn user(rhs: impl Into<String>) -> Self {
        Self {
            cmd: KeyCmd::User(rhs.into()),
            followed: FollowedBy::None,
            role: SelectorRole::Selector,
            remappable: true,
            shadowed: None,
        }
    }

    pub fn followed_by(&mut self, followed: FollowedBy) -> &mut Self {
        self.followed = followed;
        self
    }

    pub fn selector(&mut self, role: SelectorRole) -> &mut Self {
        self.role = role;
        self
    }

    pub fn remappable(&mut self) -> &mut Self {
        self.remappable = true;
        self
    }

    pub fn is_user(&self) -> bool {
        matches!(self.cmd, KeyCmd::User(_))
    }
}

/// Shape of a node as seen by dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Terminal,
    WaitPoint,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    key: char,
    next: usize,
}

#[derive(Debug)]
struct Node<H> {
    binding: Option<KeyBinding<H>>,
    edges: SmallVec<[Edge; 4]>,
}

impl<H> Node<H> {
    fn new() -> Self {
        Self {
            binding: None,
            edges: SmallVec::new(),
        }
    }
}

#[derive(Debug)]
pub struct KeyTrie<H> {
    nodes: Vec<Node<H>>,
    free: Vec<usize>,
}

impl<H> Default for KeyTrie<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> KeyTrie<H> {
    pub const ROOT: usize = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
            free: Vec::new(),
        }
    }

    pub fn child(&self, node: usize, key: char) -> Option<usize> {
        let edges = &self.nodes[node].edges;
        edges
            .binary_search_by(|e| e.key.cmp(&key))
            .ok()
            .map(|i| edges[i].next)
    }

    pub fn has_children(&self, node: usize) -> bool {
        !self.nodes[node].edges.is_empty()
    }

    pub fn binding(&self, node: usize) -> Option<&KeyBinding<H>> {
        self.nodes[node].binding.as_ref()
    }

    pub fn kind(&self, node: usize) -> Option<NodeKind> {
        match (&self.nodes[node].binding, self.has_children(node)) {
            (Some(_), _) => Some(NodeKind::Terminal),
            (None, true) => Some(NodeKind::WaitPoint),
            (None, false) => None,
        }
    }

    /// Node reached by `keys`, if every key has an edge.
    pub fn find(&self, keys: &str) -> Option<usize> {
        keys.chars()
            .try_fold(Self::ROOT, |node, key| self.child(node, key))
    }

    /// Walks `keys`, creating missing nodes, and returns the final node.
    pub fn insert_path(&mut self, keys: &str) -> usize {
        let mut cur = Self::ROOT;
        for key in keys.chars() {
            cur = match self.nodes[cur].edges.binary_search_by(|e| e.key.cmp(&key)) {
                Ok(i) => self.nodes[cur].edges[i].next,
                Err(pos) => {
                    let next = self.alloc();
                    self.nodes[cur].edges.insert(pos, Edge { key, next });
                    trace!(target: "keys.map", key = %key, parent = cur, node = next, "node_created");
                    next
                }
            };
        }
        cur
    }

    /// Installs `binding` at `node`, returning the previous descriptor.
    pub fn set_binding(&mut self, node: usize, binding: KeyBinding<H>) -> Option<KeyBinding<H>> {
        self.nodes[node].binding.replace(binding)
    }

    pub fn binding_mut(&mut self, node: usize) -> Option<&mut KeyBinding<H>> {
        self.nodes[node].binding.as_mut()
    }

    /// Installs a user mapping at `node`, keeping a remappable native binding
    /// underneath so that unmapping restores it.
    pub fn shadow(&mut self, node: usize, mut binding: KeyBinding<H>) {
        match self.nodes[node].binding.take() {
            Some(prev) if !prev.is_user() => binding.shadowed = Some(Box::new(prev)),
            Some(prev) => binding.shadowed = prev.shadowed,
            None => {}
        }
        self.nodes[node].binding = Some(binding);
    }

    /// Removes the user mapping at the end of `keys`. A shadowed native
    /// binding comes back; otherwise childless nodes are pruned up the path.
    pub fn remove_user(&mut self, keys: &str) -> Option<KeyBinding<H>> {
        let mut path = vec![Self::ROOT];
        for key in keys.chars() {
            let next = self.child(*path.last()?, key)?;
            path.push(next);
        }
        let node = *path.last()?;
        if !self.nodes[node].binding.as_ref()?.is_user() {
            return None;
        }
        let mut removed = self.nodes[node].binding.take()?;
        if let Some(native) = removed.shadowed.take() {
            self.nodes[node].binding = Some(*native);
            return Some(removed);
        }
        for pair in path.windows(2).rev() {
            let (parent, child) = (pair[0], pair[1]);
            if self.nodes[child].binding.is_some() || self.has_children(child) {
                break;
            }
            self.nodes[parent].edges.retain(|e| e.next != child);
            self.free.push(child);
        }
        Some(removed)
    }

    /// Every bound sequence in lexical order.
    pub fn bindings(&self) -> Vec<(String, &KeyBinding<H>)> {
        let mut out = Vec::new();
        let mut prefix = String::new();
        self.collect(Self::ROOT, &mut prefix, &mut out);
        out
    }

    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[Self::ROOT] = Node::new();
        self.free.clear();
    }

    fn collect<'a>(
        &'a self,
        node: usize,
        prefix: &mut String,
        out: &mut Vec<(String, &'a KeyBinding<H>)>,
    ) {
        if let Some(binding) = &self.nodes[node].binding {
            out.push((prefix.clone(), binding));
        }
        for edge in &self.nodes[node].edges {
            prefix.push(edge.key);
            self.collect(edge.next, prefix, out);
            prefix.pop();
        }
    }

    fn alloc(&mut self) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Node::new();
                idx
            }
            None => {
                self.nodes.push(Node::new());
                self.nodes.len() - 1
            }
        }
    }
}
