//! Coalescing trigger in front of a [`TaskCoordinator`](crate::TaskCoordinator).
//!
//! The first [`DebounceTrigger::request`] arms a timer; later requests inside
//! the window fold into that same firing instead of pushing it back, which
//! bounds latency under a continuous stream of edits. The firing itself is a
//! context job, so it always runs on the single-threaded context and never
//! inside the caller of `request`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::context::ContextHandle;
use crate::token::{Generation, GenerationGuard};
use crate::{TaskClass, spawn};

type FireFn<S> = Arc<dyn Fn(&mut S) + Send + Sync>;

#[derive(Debug)]
struct Armed {
	generation: Generation,
	cancel: CancellationToken,
}

/// Delays and coalesces requests into a single invocation on the context.
pub struct DebounceTrigger<S: 'static> {
	name: &'static str,
	delay: Duration,
	context: ContextHandle<S>,
	guard: GenerationGuard,
	armed: Arc<Mutex<Option<Armed>>>,
	fire: FireFn<S>,
}

impl<S: 'static> std::fmt::Debug for DebounceTrigger<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DebounceTrigger")
			.field("name", &self.name)
			.field("delay", &self.delay)
			.field("armed", &self.armed.lock().as_ref().map(|a| a.generation))
			.finish()
	}
}

impl<S: 'static> DebounceTrigger<S> {
	/// Creates a trigger that runs `fire` on the context `delay` after the
	/// first request of a burst. A zero delay fires on the next context drain.
	pub fn new(name: &'static str, delay: Duration, context: ContextHandle<S>, fire: impl Fn(&mut S) + Send + Sync + 'static) -> Self {
		Self {
			name,
			delay,
			context,
			guard: GenerationGuard::new(),
			armed: Arc::new(Mutex::new(None)),
			fire: Arc::new(fire),
		}
	}

	/// Configured coalescing window.
	pub fn delay(&self) -> Duration {
		self.delay
	}

	/// True while a firing is armed and has not run yet.
	pub fn is_pending(&self) -> bool {
		self.armed.lock().is_some()
	}

	/// Arms the trigger unless it is already armed.
	///
	/// Returns true when this call armed a new firing, false when it was
	/// coalesced into the pending one.
	pub fn request(&self) -> bool {
		let mut armed = self.armed.lock();
		if armed.is_some() {
			tracing::trace!(trigger = self.name, "debounce.coalesced");
			return false;
		}

		let generation = self.guard.next_generation();
		let cancel = CancellationToken::new();
		*armed = Some(Armed {
			generation,
			cancel: cancel.clone(),
		});
		drop(armed);
		tracing::trace!(trigger = self.name, %generation, delay_ms = self.delay.as_millis() as u64, "debounce.armed");

		let job = self.fire_job(generation);
		if self.delay.is_zero() {
			self.context.post(job);
			return true;
		}

		let deadline = tokio::time::Instant::now() + self.delay;
		let context = self.context.clone();
		spawn(TaskClass::Interactive, async move {
			tokio::select! {
				_ = cancel.cancelled() => {}
				_ = tokio::time::sleep_until(deadline) => {
					context.post(job);
				}
			}
		});
		true
	}

	/// Disarms a pending firing without running it.
	///
	/// Also covers a firing whose timer already elapsed but whose job is still
	/// queued on the context. Returns true if something was disarmed.
	pub fn cancel_pending(&self) -> bool {
		let Some(armed) = self.armed.lock().take() else {
			return false;
		};
		armed.cancel.cancel();
		tracing::trace!(trigger = self.name, generation = %armed.generation, "debounce.cancelled");
		true
	}

	fn fire_job(&self, generation: Generation) -> impl FnOnce(&mut S) + Send + 'static {
		let name = self.name;
		let armed = Arc::clone(&self.armed);
		let fire = Arc::clone(&self.fire);
		move |state: &mut S| {
			{
				let mut slot = armed.lock();
				if slot.as_ref().is_none_or(|a| a.generation != generation) {
					tracing::trace!(trigger = name, %generation, "debounce.stale_fire");
					return;
				}
				*slot = None;
			}
			tracing::debug!(trigger = name, %generation, "debounce.fire");
			fire(state);
		}
	}
}

impl<S: 'static> Drop for DebounceTrigger<S> {
	fn drop(&mut self) {
		self.cancel_pending();
	}
}
