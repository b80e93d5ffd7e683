use crate::{Error, Result, StatusResult, UnitState};
use core::time::Duration;
use futures::Stream;
use tokio::sync::mpsc;

/// The consuming end of one aggregation.
///
/// Owns the receiver of the capacity-matched result queue and yields at most
/// `expected` results, in the order workers finished. Dropping the collector
/// abandons the aggregation: workers still run to completion, but their
/// verdicts are discarded.
#[derive(Debug)]
pub struct ResultCollector {
    rx: Option<mpsc::Receiver<StatusResult>>,
    expected: usize,
    received: usize,
}

impl ResultCollector {
    pub(crate) const fn new(rx: mpsc::Receiver<StatusResult>, expected: usize) -> Self {
        Self {
            rx: Some(rx),
            expected,
            received: 0,
        }
    }

    /// A collector for a zero-unit aggregation. It is already done.
    pub(crate) const fn empty() -> Self {
        Self {
            rx: None,
            expected: 0,
            received: 0,
        }
    }

    /// Number of results this aggregation will produce.
    pub const fn expected(&self) -> usize {
        self.expected
    }

    /// Number of results yielded so far.
    pub const fn received(&self) -> usize {
        self.received
    }

    pub const fn remaining(&self) -> usize {
        self.expected - self.received
    }

    pub const fn is_done(&self) -> bool {
        self.received >= self.expected
    }

    /// Waits for the next result in arrival order.
    ///
    /// Returns `None` once `expected` results have been yielded.
    pub async fn next(&mut self) -> Option<StatusResult> {
        if self.is_done() {
            // Release the queue as soon as the last verdict is in.
            self.rx = None;
            return None;
        }
        let result = self.rx.as_mut()?.recv().await?;
        self.received += 1;
        Some(result)
    }

    /// Blocks until every unit has reported.
    pub async fn collect(mut self) -> AggregateReport {
        let mut results = Vec::with_capacity(self.remaining());
        while let Some(result) = self.next().await {
            results.push(result);
        }
        AggregateReport::new(results, self.expected)
    }

    /// Collects until every unit has reported or `limit` elapses, whichever
    /// comes first.
    ///
    /// Units that have not reported by then are left running; the returned
    /// report is partial (see [`AggregateReport::is_complete`]).
    pub async fn collect_within(mut self, limit: Duration) -> AggregateReport {
        let mut results = Vec::with_capacity(self.remaining());
        let drained = tokio::time::timeout(limit, async {
            while let Some(result) = self.next().await {
                results.push(result);
            }
        })
        .await;

        if drained.is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Collection deadline of {:?} elapsed with {}/{} results",
                limit,
                results.len(),
                self.expected
            );
        }
        AggregateReport::new(results, self.expected)
    }

    /// Converts the collector into a [`Stream`] of results in arrival order.
    pub fn into_stream(self) -> impl Stream<Item = StatusResult> + Send + 'static {
        futures::stream::unfold(self, |mut collector| async move {
            collector.next().await.map(|result| (result, collector))
        })
    }
}

/// The results of one aggregation, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    results: Vec<StatusResult>,
    expected: usize,
}

impl AggregateReport {
    pub const fn new(results: Vec<StatusResult>, expected: usize) -> Self {
        Self { results, expected }
    }

    pub fn results(&self) -> &[StatusResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<StatusResult> {
        self.results
    }

    pub const fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.results.len()
    }

    /// Whether every dispatched unit reported.
    pub fn is_complete(&self) -> bool {
        self.results.len() == self.expected
    }

    /// Number of results in the given state.
    pub fn count(&self, state: UnitState) -> usize {
        self.results.iter().filter(|r| r.state() == state).count()
    }

    /// Returns the results, or [`Error::PartialAggregation`] if any unit did
    /// not report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialAggregation`] when `received < expected`.
    pub fn ensure_complete(self) -> Result<Vec<StatusResult>> {
        if self.is_complete() {
            Ok(self.results)
        } else {
            Err(Error::PartialAggregation {
                received: self.results.len(),
                expected: self.expected,
            })
        }
    }
}
