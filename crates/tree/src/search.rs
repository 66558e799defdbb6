use std::sync::Arc;

use crate::node::{Node, NodeId, NodeTag, NodeTree};

/// One pre-order slot of a [`SearchIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
	pub node: NodeId,
	pub matched: bool,
}

/// Flattened pre-order view of a tree with match flags.
///
/// Built once per query; matches are addressed by their position in the
/// flattened sequence so navigation never walks the tree again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIndex {
	entries: Vec<IndexEntry>,
	matches: Vec<usize>,
}

impl SearchIndex {
	/// Flattens `tree` in pre-order, flagging nodes accepted by `predicate`.
	pub fn build<K: NodeTag>(tree: &NodeTree<K>, mut predicate: impl FnMut(&Node<K>) -> bool) -> Self {
		let mut entries = Vec::with_capacity(tree.len());
		let mut matches = Vec::new();
		for (position, node) in tree.preorder().enumerate() {
			let matched = predicate(&tree[node]);
			if matched {
				matches.push(position);
			}
			entries.push(IndexEntry { node, matched });
		}
		Self { entries, matches }
	}

	pub fn entries(&self) -> &[IndexEntry] {
		&self.entries
	}

	/// Sequence positions of matched entries, ascending.
	pub fn match_positions(&self) -> &[usize] {
		&self.matches
	}

	pub fn matches_count(&self) -> usize {
		self.matches.len()
	}

	/// First match strictly after `position`, wrapping to the first match.
	fn after(&self, position: usize) -> Option<(usize, bool)> {
		let at = self.matches.partition_point(|&m| m <= position);
		match self.matches.get(at) {
			Some(&next) => Some((next, false)),
			None => self.matches.first().map(|&first| (first, true)),
		}
	}

	/// Last match strictly before `position`, wrapping to the last match.
	fn before(&self, position: usize) -> Option<(usize, bool)> {
		let at = self.matches.partition_point(|&m| m < position);
		match at.checked_sub(1) {
			Some(prev) => Some((self.matches[prev], false)),
			None => self.matches.last().map(|&last| (last, true)),
		}
	}
}

/// Substring predicate over node messages.
///
/// Case-insensitive matching folds both sides to lowercase.
pub fn text_predicate<K: NodeTag>(text: &str, case_sensitive: bool) -> impl FnMut(&Node<K>) -> bool + use<K> {
	let needle = if case_sensitive { text.to_owned() } else { text.to_lowercase() };
	move |node: &Node<K>| {
		if case_sensitive {
			node.message().contains(&needle)
		} else {
			node.message().to_lowercase().contains(&needle)
		}
	}
}

/// Stateful search cursor over one published tree.
///
/// The cursor lives in the flattened sequence of the current index. Replacing
/// the tree drops both, so a cursor can never point into a stale index.
#[derive(Debug)]
pub struct TreeSearch<K> {
	tree: Arc<NodeTree<K>>,
	index: Option<SearchIndex>,
	cursor: Option<usize>,
	wrapped: bool,
	case_sensitive: bool,
}

impl<K: NodeTag> TreeSearch<K> {
	/// Creates an inactive search over `tree`.
	pub fn new(tree: Arc<NodeTree<K>>) -> Self {
		Self {
			tree,
			index: None,
			cursor: None,
			wrapped: false,
			case_sensitive: false,
		}
	}

	/// Sets case sensitivity for subsequent [`first_match`](Self::first_match) calls.
	pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
		self.case_sensitive = case_sensitive;
		self
	}

	pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
		self.case_sensitive = case_sensitive;
	}

	pub fn tree(&self) -> &Arc<NodeTree<K>> {
		&self.tree
	}

	/// Swaps in a freshly built tree and invalidates the cursor.
	pub fn reset(&mut self, tree: Arc<NodeTree<K>>) {
		self.tree = tree;
		self.clear();
	}

	/// Drops the index and cursor, keeping the tree.
	pub fn clear(&mut self) {
		self.index = None;
		self.cursor = None;
		self.wrapped = false;
	}

	/// Builds an index for `text` and positions the cursor on the first match.
	///
	/// Empty text clears the search and returns `None`.
	pub fn first_match(&mut self, text: &str) -> Option<NodeId> {
		if text.is_empty() {
			self.clear();
			return None;
		}
		let index = SearchIndex::build(&self.tree, text_predicate(text, self.case_sensitive));
		self.cursor = index.match_positions().first().copied();
		self.wrapped = false;
		self.index = Some(index);
		self.current()
	}

	/// Advances to the next match, wrapping past the end.
	pub fn next_match(&mut self) -> Option<NodeId> {
		self.step(SearchIndex::after)
	}

	/// Moves to the previous match, wrapping past the start.
	pub fn previous_match(&mut self) -> Option<NodeId> {
		self.step(SearchIndex::before)
	}

	fn step(&mut self, pick: fn(&SearchIndex, usize) -> Option<(usize, bool)>) -> Option<NodeId> {
		let index = self.index.as_ref()?;
		let position = self.cursor?;
		let (next, wrapped) = pick(index, position)?;
		self.cursor = Some(next);
		self.wrapped = wrapped;
		self.current()
	}

	/// Node under the cursor.
	pub fn current(&self) -> Option<NodeId> {
		let index = self.index.as_ref()?;
		self.cursor.map(|position| index.entries[position].node)
	}

	/// 1-based ordinal of the current match among all matches, or 0.
	pub fn current_absolute_match_index(&self) -> usize {
		match (&self.index, self.cursor) {
			(Some(index), Some(position)) => index.matches.binary_search(&position).map_or(0, |ordinal| ordinal + 1),
			_ => 0,
		}
	}

	pub fn matches_count(&self) -> usize {
		self.index.as_ref().map_or(0, SearchIndex::matches_count)
	}

	/// True if the last navigation step crossed the end of the sequence.
	pub fn search_wrapped(&self) -> bool {
		self.wrapped
	}

	/// True once [`first_match`](Self::first_match) has built an index for the current tree.
	pub fn is_active(&self) -> bool {
		self.index.is_some()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	enum Kind {
		Line,
	}

	impl NodeTag for Kind {
		fn is_error(self) -> bool {
			false
		}
	}

	fn flat(hits: &[usize], len: usize) -> (Arc<NodeTree<Kind>>, Vec<NodeId>) {
		let mut tree = NodeTree::new();
		let ids = (0..len)
			.map(|i| tree.add_root(Kind::Line, if hits.contains(&i) { format!("Hit {i}") } else { format!("line {i}") }))
			.collect();
		(Arc::new(tree), ids)
	}

	#[test]
	fn forward_navigation_wraps_to_the_first_match() {
		let (tree, ids) = flat(&[2, 5, 9], 10);
		let mut search = TreeSearch::new(tree);

		assert_eq!(search.first_match("hit"), Some(ids[2]));
		assert_eq!((search.current_absolute_match_index(), search.matches_count()), (1, 3));
		assert_eq!(search.next_match(), Some(ids[5]));
		assert_eq!(search.next_match(), Some(ids[9]));
		assert!(!search.search_wrapped());
		assert_eq!(search.current_absolute_match_index(), 3);

		assert_eq!(search.next_match(), Some(ids[2]));
		assert!(search.search_wrapped());
		assert_eq!(search.current_absolute_match_index(), 1);
	}

	#[test]
	fn backward_navigation_wraps_to_the_last_match() {
		let (tree, ids) = flat(&[2, 5, 9], 10);
		let mut search = TreeSearch::new(tree);
		search.first_match("hit");

		assert_eq!(search.previous_match(), Some(ids[9]));
		assert!(search.search_wrapped());
		assert_eq!(search.previous_match(), Some(ids[5]));
		assert!(!search.search_wrapped());
	}

	#[test]
	fn empty_text_and_no_matches_leave_no_cursor() {
		let (tree, _) = flat(&[1], 3);
		let mut search = TreeSearch::new(tree);

		assert_eq!(search.first_match(""), None);
		assert!(!search.is_active());
		assert_eq!(search.next_match(), None);

		assert_eq!(search.first_match("absent"), None);
		assert!(search.is_active());
		assert_eq!(search.matches_count(), 0);
		assert_eq!(search.current_absolute_match_index(), 0);
		assert_eq!(search.next_match(), None);
		assert_eq!(search.previous_match(), None);
	}

	#[test]
	fn case_sensitivity_is_opt_in() {
		let (tree, ids) = flat(&[4], 6);
		let mut search = TreeSearch::new(tree).with_case_sensitive(true);
		assert_eq!(search.first_match("hit"), None);
		assert_eq!(search.first_match("Hit"), Some(ids[4]));
	}

	#[test]
	fn single_match_wraps_onto_itself() {
		let (tree, ids) = flat(&[0], 2);
		let mut search = TreeSearch::new(tree);
		search.first_match("hit");
		assert_eq!(search.next_match(), Some(ids[0]));
		assert!(search.search_wrapped());
	}

	#[test]
	fn reset_invalidates_the_cursor() {
		let (tree, _) = flat(&[2, 5], 8);
		let mut search = TreeSearch::new(tree);
		search.first_match("hit");
		search.next_match();

		let (rebuilt, _) = flat(&[], 3);
		search.reset(rebuilt);
		assert!(!search.is_active());
		assert_eq!(search.current(), None);
		assert_eq!(search.next_match(), None);
		assert_eq!(search.current_absolute_match_index(), 0);
	}

	#[test]
	fn index_follows_preorder_of_nested_nodes() {
		let mut tree = NodeTree::new();
		let a = tree.add_root(Kind::Line, "a");
		let a1 = tree.add_child(a, Kind::Line, "match a1");
		let b = tree.add_root(Kind::Line, "match b");
		let index = SearchIndex::build(&tree, text_predicate("match", false));
		assert_eq!(index.entries().iter().map(|e| e.node).collect::<Vec<_>>(), vec![a, a1, b]);
		assert_eq!(index.match_positions(), &[1, 2]);
	}
}
