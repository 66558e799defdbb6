use std::ops::Range;
use std::sync::Arc;

use ropey::Rope;

/// Editable document text with a version bumped on every change.
#[derive(Debug, Clone)]
pub struct TextBuffer {
	rope: Rope,
	mime: Arc<str>,
	version: u64,
}

impl TextBuffer {
	pub fn new(text: &str, mime: impl Into<Arc<str>>) -> Self {
		Self {
			rope: Rope::from_str(text),
			mime: mime.into(),
			version: 0,
		}
	}

	/// Inserts `text` at char index `at`.
	pub fn insert(&mut self, at: usize, text: &str) -> Result<(), ropey::Error> {
		self.rope.try_insert(at, text)?;
		self.version += 1;
		Ok(())
	}

	/// Removes the chars in `range`.
	pub fn remove(&mut self, range: Range<usize>) -> Result<(), ropey::Error> {
		self.rope.try_remove(range)?;
		self.version += 1;
		Ok(())
	}

	/// Replaces the chars in `range` with `text` as a single change.
	pub fn replace(&mut self, range: Range<usize>, text: &str) -> Result<(), ropey::Error> {
		let start = range.start;
		self.rope.try_remove(range)?;
		self.rope.try_insert(start, text)?;
		self.version += 1;
		Ok(())
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn mime(&self) -> &str {
		&self.mime
	}

	pub fn len_chars(&self) -> usize {
		self.rope.len_chars()
	}

	pub fn text(&self) -> String {
		self.rope.to_string()
	}

	/// Immutable copy for background work; shares structure with the buffer.
	pub fn snapshot(&self) -> TextSnapshot {
		TextSnapshot {
			rope: self.rope.clone(),
			mime: Arc::clone(&self.mime),
			version: self.version,
		}
	}
}

/// Point-in-time view of a [`TextBuffer`].
#[derive(Debug, Clone)]
pub struct TextSnapshot {
	rope: Rope,
	mime: Arc<str>,
	version: u64,
}

impl TextSnapshot {
	pub fn rope(&self) -> &Rope {
		&self.rope
	}

	pub fn text(&self) -> String {
		self.rope.to_string()
	}

	pub fn mime(&self) -> &str {
		&self.mime
	}

	/// Buffer version this snapshot was taken at.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn line_count(&self) -> usize {
		self.rope.len_lines()
	}
}
