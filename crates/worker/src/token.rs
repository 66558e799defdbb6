use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque, strictly increasing generation identifier.
///
/// Generation `0` is never issued, so a guard that has not handed out any
/// generation yet considers nothing current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
	/// Returns the raw counter value.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for Generation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "gen#{}", self.0)
	}
}

/// Issues generations and answers whether a given one is still current.
///
/// Clones share the same counter, so a clone moved into a background
/// completion observes every later [`GenerationGuard::next_generation`] call.
/// Only the latest generation is retained.
#[derive(Debug, Default, Clone)]
pub struct GenerationGuard {
	current: Arc<AtomicU64>,
}

impl GenerationGuard {
	/// Creates a guard with no current generation.
	pub fn new() -> Self {
		Self::default()
	}

	/// Invalidates the previous generation and returns a fresh current one.
	pub fn next_generation(&self) -> Generation {
		Generation(self.current.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
	}

	/// Returns true iff `generation` is the most recently issued one.
	pub fn is_current(&self, generation: Generation) -> bool {
		self.current.load(Ordering::Acquire) == generation.0
	}

	/// Returns the most recently issued generation, if any.
	pub fn current(&self) -> Option<Generation> {
		match self.current.load(Ordering::Acquire) {
			0 => None,
			raw => Some(Generation(raw)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_guard_has_no_current_generation() {
		let guard = GenerationGuard::new();
		assert_eq!(guard.current(), None);
	}

	#[test]
	fn next_generation_invalidates_previous() {
		let guard = GenerationGuard::new();
		let first = guard.next_generation();
		assert!(guard.is_current(first));

		let second = guard.next_generation();
		assert!(second > first);
		assert!(!guard.is_current(first));
		assert!(guard.is_current(second));
		assert_eq!(guard.current(), Some(second));
	}

	#[test]
	fn clones_share_the_counter() {
		let guard = GenerationGuard::new();
		let observer = guard.clone();
		let generation = guard.next_generation();
		assert!(observer.is_current(generation));

		observer.next_generation();
		assert!(!guard.is_current(generation));
	}

	#[test]
	fn concurrent_issuers_leave_exactly_one_current() {
		let guard = GenerationGuard::new();
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let guard = guard.clone();
				std::thread::spawn(move || (0..100).map(|_| guard.next_generation()).collect::<Vec<_>>())
			})
			.collect();

		let issued: Vec<Generation> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
		assert_eq!(issued.len(), 800);
		assert_eq!(issued.iter().filter(|g| guard.is_current(**g)).count(), 1);
	}
}
