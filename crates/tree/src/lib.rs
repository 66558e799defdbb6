//! Node trees shared by the build-output view and document outlines.
//!
//! Trees are arena-allocated: nodes own their children by [`NodeId`] and keep
//! a non-owning parent id. A tree is built once per processing pass and is not
//! edited after it is published; consumers hold it behind an `Arc` and rebuild
//! derived state ([`TreeSearch`], expansion sets) whenever a new tree arrives.

mod node;
mod search;

pub use node::{Node, NodeId, NodeTag, NodeTree, Preorder};
pub use search::{IndexEntry, SearchIndex, TreeSearch, text_predicate};
