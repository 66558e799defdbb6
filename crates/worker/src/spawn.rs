//! Spawn helpers shared by coordinators and debounce timers.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// What a spawned task is for. Recorded on every spawn event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Debounce timers; their latency is what the user feels.
	Interactive,
	/// Forwarders that await blocking work and post its result.
	Background,
	/// Parsing and log processing on the blocking pool.
	CpuBlocking,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::CpuBlocking => "cpu_blocking",
		}
	}
}

static FALLBACK: OnceLock<Runtime> = OnceLock::new();

/// Handle of the runtime the caller runs in.
///
/// Callers outside any runtime (a toolkit main loop, plain unit tests) share
/// one small multi-thread runtime built on first use. That runtime carries the
/// timer driver only: debounce timers need it, and tokio is built without
/// `net`, so there is no I/O driver to enable.
pub(crate) fn runtime_handle() -> Handle {
	Handle::try_current().unwrap_or_else(|_| {
		FALLBACK
			.get_or_init(|| {
				Builder::new_multi_thread()
					.worker_threads(2)
					.thread_name("tessera-bg")
					.enable_time()
					.build()
					.expect("tessera: cannot start the fallback tokio runtime")
			})
			.handle()
			.clone()
	})
}

pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

/// Runs `f` on the blocking pool.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
	runtime_handle().spawn_blocking(f)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fallback_runtime_drives_timers() {
		let elapsed = std::thread::spawn(|| {
			let start = std::time::Instant::now();
			let handle = spawn(TaskClass::Interactive, tokio::time::sleep(std::time::Duration::from_millis(10)));
			runtime_handle().block_on(handle).map(|()| start.elapsed())
		})
		.join()
		.unwrap();
		assert!(elapsed.unwrap() >= std::time::Duration::from_millis(10));
	}

	#[test]
	fn spawns_outside_a_runtime_use_the_fallback() {
		let value = std::thread::spawn(|| {
			let handle = spawn_blocking(TaskClass::CpuBlocking, || 21 * 2);
			runtime_handle().block_on(handle)
		})
		.join()
		.unwrap();
		assert_eq!(value.unwrap(), 42);
	}
}
