use crate::{Error, Result, WorkUnit};
use core::time::Duration;
use rand::Rng;

/// Lower bound of the reference simulated work duration.
pub const SIMULATED_WORK_MIN: Duration = Duration::from_secs(10);

/// Upper (exclusive) bound of the reference simulated work duration.
pub const SIMULATED_WORK_MAX: Duration = Duration::from_secs(20);

/// The unit of work executed by each fanned-out worker.
///
/// Implementations stand in for whatever a unit really does (querying a
/// backend, probing a host, ...). Returning `Err` marks the unit as
/// [`UnitState::Failed`](crate::UnitState::Failed); it never aborts the
/// aggregation.
///
/// We require `Send` on the returned future so that units can be spawned onto
/// the multi-threaded runtime.
pub trait Workload: Send + Sync + 'static {
    fn run(&self, unit: &WorkUnit) -> impl Future<Output = Result<()>> + Send;
}

/// Synthetic workload that sleeps for a random duration in `[min, max)`.
///
/// The variable, non-trivial duration is what lets cancellation race
/// completion. When `min == max` every unit sleeps for exactly `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedWork {
    min: Duration,
    max: Duration,
}

impl SimulatedWork {
    /// Creates a workload sleeping for a random duration in `[min, max)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkRange`] if `min > max`.
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(Error::InvalidWorkRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// A workload where every unit takes exactly `duration`.
    pub const fn fixed(duration: Duration) -> Self {
        Self {
            min: duration,
            max: duration,
        }
    }

    pub const fn min(&self) -> Duration {
        self.min
    }

    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Draws the next simulated duration.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::rng().random_range(self.min..self.max)
    }
}

impl Default for SimulatedWork {
    fn default() -> Self {
        Self {
            min: SIMULATED_WORK_MIN,
            max: SIMULATED_WORK_MAX,
        }
    }
}

impl Workload for SimulatedWork {
    async fn run(&self, _unit: &WorkUnit) -> Result<()> {
        let duration = self.sample();
        #[cfg(feature = "tracing")]
        tracing::trace!("{} sleeping for {:?}", _unit.id(), duration);
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
