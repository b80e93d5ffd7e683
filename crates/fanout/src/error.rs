use core::time::Duration;

/// A result type defaulting to the crate [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `fanout` can produce.
///
/// None of these abort an aggregation. Worker errors are folded into a
/// [`UnitState::Failed`](crate::UnitState::Failed) verdict for the affected
/// unit, and [`Error::PartialAggregation`] is only raised when a caller
/// explicitly asks for a complete report.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The unit did not finish within the configured per-unit timeout.
    #[error("unit '{unit_id}' timed out after {after:?}")]
    WorkerTimeout { unit_id: String, after: Duration },

    /// The workload reported a fault, or panicked, while running the unit.
    #[error("unit '{unit_id}' failed: {reason}")]
    WorkerFailure { unit_id: String, reason: String },

    /// Fewer than `expected` results were collected before the deadline.
    #[error("partial aggregation: received {received} of {expected} results")]
    PartialAggregation { received: usize, expected: usize },

    /// A simulated work range whose lower bound exceeds its upper bound.
    #[error("invalid work duration range: {min:?}..{max:?}")]
    InvalidWorkRange { min: Duration, max: Duration },
}

impl Error {
    /// Creates a [`Error::WorkerFailure`] for `unit_id`.
    pub fn worker_failure(unit_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerFailure {
            unit_id: unit_id.into(),
            reason: reason.into(),
        }
    }
}
