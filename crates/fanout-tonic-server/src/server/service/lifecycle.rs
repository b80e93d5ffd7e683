//! Admission control and coordinated shutdown for status aggregations.
//!
//! Every aggregation enters through [`Lifecycle::enter`], which hands out a
//! request token derived from the server-wide shutdown token and an
//! [`InflightGuard`] that keeps the in-flight count honest even when the
//! request future is dropped mid-way.

use crate::server::telemetry::{decrement_aggregations_inflight, increment_aggregations_inflight};
use core::time::Duration;
use fanout_tonic_core::Error;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

pub struct Lifecycle {
    shutdown_token: CancellationToken,
    shutting_down: AtomicBool,
    inflight: AtomicUsize,
    drain_timeout: Duration,
}

impl Lifecycle {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            shutdown_token: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
            inflight: AtomicUsize::new(0),
            drain_timeout,
        }
    }

    /// Admits a new aggregation.
    ///
    /// The returned token is a child of the shutdown token: cancelling the
    /// request never affects the server, but shutting down cancels every
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn enter(self: &Arc<Self>) -> Result<(CancellationToken, InflightGuard), Error> {
        // Count first, then check: `shutdown` sets the flag before reading the
        // count, so any request that gets past the check is seen by the drain.
        self.inflight.fetch_add(1, Ordering::SeqCst);
        if self.is_shutting_down() {
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::ServiceShutdown);
        }
        increment_aggregations_inflight();
        Ok((
            self.shutdown_token.child_token(),
            InflightGuard(Arc::clone(self)),
        ))
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Gracefully shuts down the aggregation machinery.
    ///
    /// - Refuses new aggregations.
    /// - Waits (up to the drain timeout) for in-flight aggregations to finish.
    /// - Cancels whatever is still running through the shutdown token; those
    ///   units report as canceled.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new requests ===
        tracing::info!("Refusing new status requests");
        self.shutting_down.store(true, Ordering::SeqCst);

        // === Phase 1: Wait for in-flight aggregations to drain ===
        tracing::info!(
            "Draining in-flight aggregations ({} active)",
            self.inflight()
        );
        let drained = timeout(self.drain_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight aggregations drained"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} aggregations still active)",
                self.inflight()
            ),
        }

        // === Phase 2: Cancel any remaining work ===
        tracing::debug!("Cancelling remaining work via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Decrements the in-flight count when the owning request ends, however it
/// ends.
pub struct InflightGuard(Arc<Lifecycle>);

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.inflight.fetch_sub(1, Ordering::SeqCst);
        decrement_aggregations_inflight();
    }
}
