//! Single-threaded publishing context.
//!
//! All UI-visible state `S` is owned by whoever holds the [`UiContext`]. Other
//! threads never touch `S` directly: they post jobs through a cloneable
//! [`ContextHandle`], and the owner runs those jobs against `&mut S` when it
//! drains the queue. This is the only hand-off point between worker threads and
//! the interactive thread.

use tokio::sync::mpsc;

/// A unit of work executed on the single-threaded context.
pub type ContextJob<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Owner side of the single-consumer job queue.
pub struct UiContext<S: 'static> {
	tx: mpsc::UnboundedSender<ContextJob<S>>,
	rx: mpsc::UnboundedReceiver<ContextJob<S>>,
}

/// Cloneable, thread-safe poster for a [`UiContext`].
pub struct ContextHandle<S: 'static> {
	tx: mpsc::UnboundedSender<ContextJob<S>>,
}

impl<S: 'static> Clone for ContextHandle<S> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<S: 'static> std::fmt::Debug for ContextHandle<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ContextHandle").field("closed", &self.tx.is_closed()).finish()
	}
}

impl<S: 'static> Default for UiContext<S> {
	fn default() -> Self {
		Self::new()
	}
}

impl<S: 'static> UiContext<S> {
	/// Creates an empty context queue.
	pub fn new() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self { tx, rx }
	}

	/// Returns a handle that posts onto this context.
	pub fn handle(&self) -> ContextHandle<S> {
		ContextHandle { tx: self.tx.clone() }
	}

	/// Number of jobs waiting to run.
	pub fn pending(&self) -> usize {
		self.rx.len()
	}

	/// Runs every job that was queued when the call started.
	///
	/// Jobs posted while draining (for example a zero-delay debounce requested
	/// from inside a publish callback) wait for the next drain, so a callback
	/// can never re-enter itself synchronously.
	pub fn drain(&mut self, state: &mut S) -> usize {
		let budget = self.rx.len();
		let mut ran = 0;
		while ran < budget {
			let Ok(job) = self.rx.try_recv() else {
				break;
			};
			job(state);
			ran += 1;
		}
		if ran > 0 {
			tracing::trace!(ran, left = self.rx.len(), "context.drain");
		}
		ran
	}

	/// Waits for the next job and runs it.
	pub async fn run_next(&mut self, state: &mut S) {
		// The context keeps its own sender alive, so the channel never closes
		// while `self` exists and `recv` only returns `None` if that changes.
		if let Some(job) = self.rx.recv().await {
			job(state);
		}
	}
}

impl<S: 'static> ContextHandle<S> {
	/// Posts a job to the context.
	///
	/// Returns false when the owning [`UiContext`] has been dropped; the job is
	/// discarded without running.
	pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
		if self.tx.send(Box::new(job)).is_err() {
			tracing::debug!("context.post_after_close");
			return false;
		}
		true
	}

	/// Returns true once the owning context has been dropped.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn jobs_run_in_post_order_against_owned_state() {
		let mut ctx = UiContext::<Vec<u32>>::new();
		let handle = ctx.handle();
		for i in 0..3 {
			assert!(handle.post(move |log: &mut Vec<u32>| log.push(i)));
		}

		let mut log = Vec::new();
		assert_eq!(ctx.drain(&mut log), 3);
		assert_eq!(log, vec![0, 1, 2]);
		assert_eq!(ctx.pending(), 0);
	}

	#[test]
	fn jobs_posted_during_drain_wait_for_next_drain() {
		struct State {
			handle: ContextHandle<State>,
			hits: u32,
		}

		let mut ctx = UiContext::<State>::new();
		let mut state = State { handle: ctx.handle(), hits: 0 };
		state.handle.post(|s: &mut State| {
			s.hits += 1;
			s.handle.post(|s: &mut State| s.hits += 10);
		});

		assert_eq!(ctx.drain(&mut state), 1);
		assert_eq!(state.hits, 1);
		assert_eq!(ctx.drain(&mut state), 1);
		assert_eq!(state.hits, 11);
	}

	#[test]
	fn posting_after_context_drop_is_a_silent_no_op() {
		let ctx = UiContext::<u32>::new();
		let handle = ctx.handle();
		drop(ctx);

		assert!(handle.is_closed());
		assert!(!handle.post(|n: &mut u32| *n += 1));
	}

	#[tokio::test]
	async fn run_next_waits_for_a_job_from_another_thread() {
		let mut ctx = UiContext::<String>::new();
		let handle = ctx.handle();
		std::thread::spawn(move || {
			handle.post(|s: &mut String| s.push_str("published"));
		});

		let mut state = String::new();
		ctx.run_next(&mut state).await;
		assert_eq!(state, "published");
	}
}
