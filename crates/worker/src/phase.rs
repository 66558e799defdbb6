/// Observable phase of a debounce + coordinator pipeline.
///
/// `Cancelled` is not a resting phase: cancelling from [`Self::Debouncing`]
/// or [`Self::Running`] lands directly in [`Self::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
	/// Nothing armed and nothing in flight.
	Idle,
	/// A trigger fired and the coalescing window is open.
	Debouncing,
	/// Background work is executing under the current generation.
	Running,
	/// The result is being applied on the context.
	Publishing,
}

impl PipelinePhase {
	/// Derives the phase from the pipeline's observable flags.
	///
	/// Publishing wins over everything else because a publish callback may
	/// re-arm the trigger before it returns.
	pub const fn observe(debounce_pending: bool, in_flight: bool, publishing: bool) -> Self {
		if publishing {
			Self::Publishing
		} else if in_flight {
			Self::Running
		} else if debounce_pending {
			Self::Debouncing
		} else {
			Self::Idle
		}
	}
}
