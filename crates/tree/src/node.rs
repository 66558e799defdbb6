use std::fmt;
use std::ops::Index;

use rustc_hash::FxHashSet;

/// Index of a node inside its [`NodeTree`].
///
/// Ids are only meaningful for the tree that produced them; a rebuilt tree
/// reuses the same numbers for unrelated nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
	/// Arena slot of this node.
	pub const fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Kind tag carried by every node.
pub trait NodeTag: Copy + Eq + fmt::Debug + Send + Sync + 'static {
	/// True for kinds that make the node and its ancestors report errors.
	fn is_error(self) -> bool;
}

/// One node of a [`NodeTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<K> {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	kind: K,
	message: String,
	has_errors: bool,
}

impl<K: NodeTag> Node<K> {
	/// Parent back-reference; `None` for roots.
	pub fn parent(&self) -> Option<NodeId> {
		self.parent
	}

	/// Children in insertion order.
	pub fn children(&self) -> &[NodeId] {
		&self.children
	}

	/// Kind tag.
	pub fn kind(&self) -> K {
		self.kind
	}

	/// Message text.
	pub fn message(&self) -> &str {
		&self.message
	}

	/// True if this node is an error or has an error somewhere below it.
	pub fn has_errors(&self) -> bool {
		self.has_errors
	}
}

/// Arena tree with ordered roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTree<K> {
	nodes: Vec<Node<K>>,
	roots: Vec<NodeId>,
}

impl<K> Default for NodeTree<K> {
	fn default() -> Self {
		Self {
			nodes: Vec::new(),
			roots: Vec::new(),
		}
	}
}

impl<K: NodeTag> NodeTree<K> {
	/// Creates an empty tree.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a root node.
	pub fn add_root(&mut self, kind: K, message: impl Into<String>) -> NodeId {
		let id = self.push(None, kind, message.into());
		self.roots.push(id);
		id
	}

	/// Appends a child under `parent`.
	///
	/// Error kinds propagate `has_errors` to every ancestor.
	///
	/// # Panics
	///
	/// Panics if `parent` does not belong to this tree.
	pub fn add_child(&mut self, parent: NodeId, kind: K, message: impl Into<String>) -> NodeId {
		assert!(parent.index() < self.nodes.len(), "parent {parent} is not in this tree");
		let id = self.push(Some(parent), kind, message.into());
		self.nodes[parent.index()].children.push(id);
		if kind.is_error() {
			let mut cursor = Some(parent);
			while let Some(up) = cursor {
				let node = &mut self.nodes[up.index()];
				if node.has_errors {
					break;
				}
				node.has_errors = true;
				cursor = node.parent;
			}
		}
		id
	}

	fn push(&mut self, parent: Option<NodeId>, kind: K, message: String) -> NodeId {
		debug_assert!(self.nodes.len() < u32::MAX as usize);
		let id = NodeId(self.nodes.len() as u32);
		self.nodes.push(Node {
			parent,
			children: Vec::new(),
			kind,
			message,
			has_errors: kind.is_error(),
		});
		id
	}

	/// Root nodes in insertion order.
	pub fn roots(&self) -> &[NodeId] {
		&self.roots
	}

	/// Number of nodes.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// True if the tree has no nodes.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Looks up a node.
	pub fn get(&self, id: NodeId) -> Option<&Node<K>> {
		self.nodes.get(id.index())
	}

	/// True if `id` names a node of this tree.
	pub fn contains(&self, id: NodeId) -> bool {
		id.index() < self.nodes.len()
	}

	/// Nodes sharing `id`'s parent, or the roots for a root node.
	pub fn siblings(&self, id: NodeId) -> &[NodeId] {
		match self.get(id).and_then(Node::parent) {
			Some(parent) => &self.nodes[parent.index()].children,
			None => &self.roots,
		}
	}

	/// Path from the root down to `id`, inclusive.
	pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
		let mut path = Vec::new();
		let mut cursor = self.get(id).map(|_| id);
		while let Some(current) = cursor {
			path.push(current);
			cursor = self.nodes[current.index()].parent;
		}
		path.reverse();
		path
	}

	/// Depth-first pre-order traversal over all roots.
	pub fn preorder(&self) -> Preorder<'_, K> {
		Preorder::new(self, &self.roots)
	}

	/// Pre-order traversal of the subtree rooted at `id`.
	pub fn preorder_from(&self, id: NodeId) -> Preorder<'_, K> {
		Preorder {
			tree: self,
			stack: if self.contains(id) { vec![id] } else { Vec::new() },
		}
	}

	/// First node of `kind` with exactly `message`, searching `scope`'s subtree
	/// (or the whole tree) in pre-order.
	pub fn search_first(&self, scope: Option<NodeId>, kind: K, message: &str) -> Option<NodeId> {
		let matches = |id: &NodeId| {
			let node = &self.nodes[id.index()];
			node.kind == kind && node.message == message
		};
		match scope {
			Some(scope) => self.preorder_from(scope).find(matches),
			None => self.preorder().find(matches),
		}
	}

	/// Nearest node of `kind` on the path from `id` up to its root, `id` included.
	pub fn inverse_search_first(&self, id: NodeId, kind: K) -> Option<NodeId> {
		let mut cursor = self.get(id).map(|_| id);
		while let Some(current) = cursor {
			let node = &self.nodes[current.index()];
			if node.kind == kind {
				return Some(current);
			}
			cursor = node.parent;
		}
		None
	}

	/// Nodes a view should show expanded: every root, plus every node on a
	/// path towards an error.
	pub fn error_expansion(&self) -> FxHashSet<NodeId> {
		let mut expanded = FxHashSet::default();
		let mut stack: Vec<NodeId> = self.roots.clone();
		expanded.extend(self.roots.iter().copied());
		while let Some(id) = stack.pop() {
			for &child in &self.nodes[id.index()].children {
				if self.nodes[child.index()].has_errors {
					expanded.insert(child);
					stack.push(child);
				}
			}
		}
		expanded
	}
}

impl<K> Index<NodeId> for NodeTree<K> {
	type Output = Node<K>;

	fn index(&self, id: NodeId) -> &Node<K> {
		&self.nodes[id.index()]
	}
}

/// Pre-order iterator over a [`NodeTree`].
pub struct Preorder<'a, K> {
	tree: &'a NodeTree<K>,
	stack: Vec<NodeId>,
}

impl<'a, K> Preorder<'a, K> {
	fn new(tree: &'a NodeTree<K>, start: &[NodeId]) -> Self {
		Self {
			tree,
			stack: start.iter().rev().copied().collect(),
		}
	}
}

impl<K> Iterator for Preorder<'_, K> {
	type Item = NodeId;

	fn next(&mut self) -> Option<NodeId> {
		let id = self.stack.pop()?;
		self.stack.extend(self.tree.nodes[id.index()].children.iter().rev().copied());
		Some(id)
	}
}
