use super::{collector::ResultCollector, worker::run_unit};
use crate::{StatusResult, WorkUnit, Workload};
use core::time::Duration;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How workers react to a cancellation that arrives while their work is still
/// running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CancelMode {
    /// Let the work finish, then report [`UnitState::Canceled`]. A cancelled
    /// aggregation still takes as long as its slowest unit.
    ///
    /// [`UnitState::Canceled`]: crate::UnitState::Canceled
    #[default]
    Relabel,
    /// Stop waiting on the work as soon as the token fires and report
    /// [`UnitState::Canceled`] immediately.
    ///
    /// [`UnitState::Canceled`]: crate::UnitState::Canceled
    Abort,
}

/// Tuning knobs for an [`Aggregator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub cancel_mode: CancelMode,
    /// Upper bound on a single unit's work. Units exceeding it report
    /// [`UnitState::Failed`](crate::UnitState::Failed).
    pub unit_timeout: Option<Duration>,
}

/// Fans a request out into concurrent units and merges their verdicts.
///
/// The aggregator itself is stateless between calls; every call to
/// [`dispatch`](Self::dispatch) or [`aggregate`](Self::aggregate) gets its own
/// result queue, so concurrent calls with different tokens never observe each
/// other's results.
#[derive(Debug)]
pub struct Aggregator<W> {
    workload: Arc<W>,
    config: AggregatorConfig,
}

impl<W> Clone for Aggregator<W> {
    fn clone(&self) -> Self {
        Self {
            workload: Arc::clone(&self.workload),
            config: self.config,
        }
    }
}

impl<W: Workload> Aggregator<W> {
    pub fn new(workload: W) -> Self {
        Self::with_config(workload, AggregatorConfig::default())
    }

    pub fn with_config(workload: W, config: AggregatorConfig) -> Self {
        Self {
            workload: Arc::new(workload),
            config,
        }
    }

    /// Spawns `unit_count` workers and returns the collector for their
    /// results.
    ///
    /// Workers are detached: they keep running if the returned collector is
    /// dropped. `unit_count == 0` spawns nothing and returns a collector that
    /// is already done.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, cancel)))]
    pub fn dispatch(&self, unit_count: usize, cancel: &CancellationToken) -> ResultCollector {
        if unit_count == 0 {
            return ResultCollector::empty();
        }

        // One slot per unit: a worker's send can never wait on the consumer.
        let (tx, rx) = mpsc::channel(unit_count);

        for index in 0..unit_count {
            tokio::spawn(run_unit(
                WorkUnit::new(index),
                Arc::clone(&self.workload),
                cancel.clone(),
                self.config,
                tx.clone(),
            ));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Dispatched {unit_count} units");

        ResultCollector::new(rx, unit_count)
    }

    /// Runs `unit_count` units and returns every verdict in arrival order.
    ///
    /// Always returns exactly `unit_count` results. The token is only read by
    /// the workers; this method waits for all of them regardless of its state.
    pub async fn aggregate(
        &self,
        unit_count: usize,
        cancel: &CancellationToken,
    ) -> Vec<StatusResult> {
        self.dispatch(unit_count, cancel)
            .collect()
            .await
            .into_results()
    }
}
