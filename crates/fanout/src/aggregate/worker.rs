use crate::{AggregatorConfig, CancelMode, Error, Result, StatusResult, WorkUnit, Workload};
use core::time::Duration;
use futures::FutureExt;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Worker task for a single [`WorkUnit`].
///
/// Runs the unit's work, then checks `cancel` exactly once to pick the
/// verdict, and sends that verdict to the collector. The send never waits for
/// capacity because the queue is sized to the number of units.
///
/// # Behavior
///
/// - [`CancelMode::Relabel`]: the work always runs to completion; cancellation
///   only changes the verdict.
/// - [`CancelMode::Abort`]: the worker stops waiting on the work as soon as
///   `cancel` fires and reports [`UnitState::Canceled`].
/// - A workload error, timeout, or panic becomes a [`UnitState::Failed`]
///   verdict unless the request was cancelled first.
///
/// [`UnitState::Canceled`]: crate::UnitState::Canceled
/// [`UnitState::Failed`]: crate::UnitState::Failed
pub(crate) async fn run_unit<W: Workload>(
    unit: WorkUnit,
    workload: Arc<W>,
    cancel: CancellationToken,
    config: AggregatorConfig,
    tx: mpsc::Sender<StatusResult>,
) {
    let outcome = match config.cancel_mode {
        CancelMode::Relabel => execute(&*workload, &unit, config.unit_timeout).await,
        CancelMode::Abort => {
            tokio::select! {
                // The verdict below is decided by the token, not by this arm.
                () = cancel.cancelled() => Ok(()),
                res = execute(&*workload, &unit, config.unit_timeout) => res,
            }
        }
    };

    let verdict = if cancel.is_cancelled() {
        StatusResult::canceled(&unit)
    } else {
        match outcome {
            Ok(()) => StatusResult::completed(&unit),
            Err(e) => StatusResult::failed(&unit, &e),
        }
    };

    #[cfg(feature = "tracing")]
    tracing::debug!("{} reporting {}", unit.id(), verdict.state());

    if let Err(_e) = tx.send(verdict).await {
        // The collector was dropped; nobody is reading any more.
        #[cfg(feature = "tracing")]
        tracing::trace!("{} verdict discarded: {_e}", unit.id());
    }
}

async fn execute<W: Workload>(
    workload: &W,
    unit: &WorkUnit,
    unit_timeout: Option<Duration>,
) -> Result<()> {
    let work = AssertUnwindSafe(workload.run(unit)).catch_unwind();
    let caught = match unit_timeout {
        Some(after) => tokio::time::timeout(after, work)
            .await
            .map_err(|_| Error::WorkerTimeout {
                unit_id: unit.id().to_owned(),
                after,
            })?,
        None => work.await,
    };
    caught.map_err(|panic| Error::worker_failure(unit.id(), panic_reason(&*panic)))?
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("worker panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("worker panicked: {msg}")
    } else {
        "worker panicked".to_owned()
    }
}
