//! Generation-guarded background task coordination.
//!
//! A [`TaskCoordinator`] runs each scheduled unit of work on the blocking pool
//! and marshals its completion onto a [`UiContext`](crate::UiContext). The
//! completion is applied only if its generation is still current when the
//! context runs it, so a superseded or cancelled task can finish at any time
//! without overwriting newer state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;

use crate::context::ContextHandle;
use crate::panic::join_error_panic_message;
use crate::token::{Generation, GenerationGuard};
use crate::{TaskClass, spawn, spawn_blocking};

/// Failure of a background unit of work, as seen by the error callback.
#[derive(Debug, Error)]
pub enum TaskFailure<E> {
	/// The work returned an error.
	#[error("{0}")]
	Failed(E),
	/// The work panicked; the payload is rendered as text.
	#[error("background task panicked: {0}")]
	Panicked(String),
}

type PublishFn<S, T> = Arc<dyn Fn(&mut S, T) + Send + Sync>;
type ErrorFn<S, E> = Arc<dyn Fn(&mut S, TaskFailure<E>) + Send + Sync>;

/// Flags shared between the coordinator and its in-flight completions.
#[derive(Debug, Default)]
struct Flags {
	disposed: AtomicBool,
	publishing: AtomicBool,
	/// Raw generation awaiting its completion, `0` when nothing is in flight.
	awaiting: AtomicU64,
}

fn ignore_failure<S, E>(_state: &mut S, _failure: TaskFailure<E>) {}

enum Completion<T, E> {
	Value(T),
	Failed(TaskFailure<E>),
	Cancelled,
}

/// Runs work off-thread and publishes at most the latest result onto a context.
pub struct TaskCoordinator<S: 'static, T, E> {
	name: &'static str,
	class: TaskClass,
	guard: GenerationGuard,
	flags: Arc<Flags>,
	context: ContextHandle<S>,
	publish: PublishFn<S, T>,
	on_error: ErrorFn<S, E>,
}

impl<S: 'static, T, E> fmt::Debug for TaskCoordinator<S, T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskCoordinator")
			.field("name", &self.name)
			.field("class", &self.class)
			.field("generation", &self.guard.current())
			.field("flags", &self.flags)
			.finish()
	}
}

impl<S, T, E> TaskCoordinator<S, T, E>
where
	S: 'static,
	T: Send + 'static,
	E: fmt::Display + Send + 'static,
{
	/// Creates a coordinator publishing onto `context` through `publish`.
	///
	/// Failures are logged and otherwise ignored until [`Self::on_error`]
	/// installs a callback.
	pub fn new(name: &'static str, context: ContextHandle<S>, publish: impl Fn(&mut S, T) + Send + Sync + 'static) -> Self {
		Self {
			name,
			class: TaskClass::CpuBlocking,
			guard: GenerationGuard::new(),
			flags: Arc::new(Flags::default()),
			context,
			publish: Arc::new(publish),
			on_error: Arc::new(ignore_failure::<S, E>),
		}
	}

	/// Installs the callback receiving failures of the current generation.
	pub fn on_error(mut self, on_error: impl Fn(&mut S, TaskFailure<E>) + Send + Sync + 'static) -> Self {
		self.on_error = Arc::new(on_error);
		self
	}

	/// Overrides the worker class used for the blocking work.
	pub fn with_class(mut self, class: TaskClass) -> Self {
		self.class = class;
		self
	}

	/// Schedules `work` under a fresh generation, superseding anything in flight.
	///
	/// Returns `None` once the coordinator has been disposed.
	pub fn schedule<W>(&self, work: W) -> Option<Generation>
	where
		W: FnOnce() -> Result<T, E> + Send + 'static,
	{
		if self.flags.disposed.load(Ordering::Acquire) {
			tracing::debug!(coordinator = self.name, "coordinator.schedule_after_dispose");
			return None;
		}

		let generation = self.guard.next_generation();
		self.flags.awaiting.store(generation.get(), Ordering::Release);
		tracing::debug!(coordinator = self.name, %generation, "coordinator.schedule");

		let name = self.name;
		let guard = self.guard.clone();
		let flags = Arc::clone(&self.flags);
		let context = self.context.clone();
		let publish = Arc::clone(&self.publish);
		let on_error = Arc::clone(&self.on_error);
		let blocking = spawn_blocking(self.class, work);

		spawn(TaskClass::Background, async move {
			let completion = match blocking.await {
				Ok(Ok(value)) => Completion::Value(value),
				Ok(Err(err)) => Completion::Failed(TaskFailure::Failed(err)),
				Err(join) => match join_error_panic_message(join) {
					Some(msg) => Completion::Failed(TaskFailure::Panicked(msg)),
					None => Completion::Cancelled,
				},
			};

			// Skip the hop entirely when already superseded; the context re-checks.
			if flags.disposed.load(Ordering::Acquire) || !guard.is_current(generation) {
				tracing::debug!(coordinator = name, %generation, "coordinator.stale");
				return;
			}

			let raw = generation.get();
			let unposted = Arc::clone(&flags);
			let posted = context.post(move |state: &mut S| {
				if flags.disposed.load(Ordering::Acquire) {
					tracing::debug!(coordinator = name, %generation, "coordinator.drop_after_dispose");
					return;
				}
				if !guard.is_current(generation) {
					tracing::debug!(coordinator = name, %generation, "coordinator.stale");
					return;
				}
				flags.awaiting.store(0, Ordering::Release);

				match completion {
					Completion::Value(value) => {
						tracing::debug!(coordinator = name, %generation, "coordinator.publish");
						flags.publishing.store(true, Ordering::Release);
						publish(state, value);
						flags.publishing.store(false, Ordering::Release);
					}
					Completion::Failed(failure) => {
						match &failure {
							TaskFailure::Panicked(msg) => {
								tracing::error!(coordinator = name, %generation, panic = %msg, "coordinator.task_panicked")
							}
							TaskFailure::Failed(err) => tracing::warn!(coordinator = name, %generation, error = %err, "coordinator.task_failed"),
						}
						on_error(state, failure);
					}
					Completion::Cancelled => {
						tracing::debug!(coordinator = name, %generation, "coordinator.task_cancelled");
					}
				}
			});
			if !posted {
				// Nobody will ever run the completion; stop reporting it as in flight.
				let _ = unposted.awaiting.compare_exchange(raw, 0, Ordering::AcqRel, Ordering::Acquire);
				tracing::debug!(coordinator = name, generation = raw, "coordinator.context_gone");
			}
		});

		Some(generation)
	}

	/// Invalidates in-flight work without scheduling anything new.
	pub fn cancel(&self) {
		let generation = self.guard.next_generation();
		self.flags.awaiting.store(0, Ordering::Release);
		tracing::debug!(coordinator = self.name, %generation, "coordinator.cancel");
	}

	/// Cancels in-flight work and stops publishing permanently. Idempotent.
	pub fn dispose(&self) {
		if self.flags.disposed.swap(true, Ordering::AcqRel) {
			return;
		}
		self.guard.next_generation();
		self.flags.awaiting.store(0, Ordering::Release);
		tracing::debug!(coordinator = self.name, "coordinator.dispose");
	}
}

impl<S: 'static, T, E> TaskCoordinator<S, T, E> {
	/// Name used in log events.
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Most recently issued generation.
	pub fn current_generation(&self) -> Option<Generation> {
		self.guard.current()
	}

	/// True while the current generation's completion has not been applied.
	pub fn is_in_flight(&self) -> bool {
		self.flags.awaiting.load(Ordering::Acquire) != 0
	}

	/// True only while the publish callback is running.
	pub fn is_publishing(&self) -> bool {
		self.flags.publishing.load(Ordering::Acquire)
	}

	/// True once [`Self::dispose`] has been called.
	pub fn is_disposed(&self) -> bool {
		self.flags.disposed.load(Ordering::Acquire)
	}
}
