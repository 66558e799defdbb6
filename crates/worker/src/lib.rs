//! Background work coordination for interactive views.
//!
//! - [`GenerationGuard`] issues generations and answers staleness checks.
//! - [`UiContext`] / [`ContextHandle`] form the single-consumer queue that owns
//!   UI-visible state.
//! - [`TaskCoordinator`] runs work on the blocking pool and publishes only the
//!   latest generation's result onto the context.
//! - [`DebounceTrigger`] coalesces bursts of requests into one firing.

mod context;
mod coordinator;
mod debounce;
mod panic;
mod phase;
mod spawn;
mod token;

pub use context::{ContextHandle, ContextJob, UiContext};
pub use coordinator::{TaskCoordinator, TaskFailure};
pub use debounce::DebounceTrigger;
pub use panic::join_error_panic_message;
pub use phase::PipelinePhase;
pub use spawn::{TaskClass, spawn, spawn_blocking};
pub use token::{Generation, GenerationGuard};
