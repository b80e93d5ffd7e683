use crate::{
    Aggregator, AggregatorConfig, CancelMode, Error, Result, SimulatedWork, StatusResult,
    UnitState, WorkUnit, Workload,
};
use core::time::Duration;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Sleeps for a per-unit delay taken from its dispatch index.
struct Scheduled(Vec<Duration>);

impl Scheduled {
    fn millis(delays: &[u64]) -> Self {
        Self(delays.iter().copied().map(Duration::from_millis).collect())
    }
}

impl Workload for Scheduled {
    async fn run(&self, unit: &WorkUnit) -> Result<()> {
        sleep(self.0[unit.index()]).await;
        Ok(())
    }
}

/// Unit 1 reports an error and unit 2 panics; all others succeed.
struct Faulty;

impl Workload for Faulty {
    async fn run(&self, unit: &WorkUnit) -> Result<()> {
        sleep(Duration::from_millis(10)).await;
        match unit.index() {
            1 => Err(Error::worker_failure(unit.id(), "backend unreachable")),
            2 => panic!("boom"),
            _ => Ok(()),
        }
    }
}

/// Counts how many units ran to the end of their work.
struct Counting {
    finished: Arc<AtomicUsize>,
}

impl Workload for Counting {
    async fn run(&self, _unit: &WorkUnit) -> Result<()> {
        sleep(Duration::from_millis(50)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn ids(results: &[StatusResult]) -> Vec<&str> {
    results.iter().map(StatusResult::unit_id).collect()
}

fn states(results: &[StatusResult]) -> Vec<UnitState> {
    results.iter().map(StatusResult::state).collect()
}

#[tokio::test(start_paused = true)]
async fn zero_units_returns_immediately() {
    let aggregator = Aggregator::new(SimulatedWork::default());
    let start = Instant::now();

    let results = aggregator.aggregate(0, &CancellationToken::new()).await;

    assert!(results.is_empty());
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn five_units_without_cancellation_all_complete() {
    let aggregator = Aggregator::new(SimulatedWork::default());
    let start = Instant::now();

    let results = aggregator.aggregate(5, &CancellationToken::new()).await;

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.state() == UnitState::Completed));
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(start.elapsed() < Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn immediate_cancellation_marks_every_unit_canceled() {
    let aggregator = Aggregator::new(SimulatedWork::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let start = Instant::now();

    let results = aggregator.aggregate(5, &cancel).await;

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.state() == UnitState::Canceled));
    // Relabel mode still waits for the work itself.
    assert!(start.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn single_unit_reports_once_whatever_the_cancel_timing() {
    let aggregator = Aggregator::new(SimulatedWork::fixed(Duration::from_secs(10)));

    for cancel_after in [None, Some(0), Some(5), Some(15)] {
        let cancel = CancellationToken::new();
        if let Some(secs) = cancel_after {
            let token = cancel.clone();
            tokio::spawn(async move {
                sleep(Duration::from_secs(secs)).await;
                token.cancel();
            });
        }

        let results = aggregator.aggregate(1, &cancel).await;
        assert_eq!(results.len(), 1, "cancel_after = {cancel_after:?}");
        assert_eq!(results[0].unit_id(), "job-0");
    }
}

#[tokio::test(start_paused = true)]
async fn results_arrive_in_completion_order() {
    let aggregator = Aggregator::new(Scheduled::millis(&[50, 40, 30, 20, 10]));

    let results = aggregator.aggregate(5, &CancellationToken::new()).await;

    assert_eq!(ids(&results), ["job-4", "job-3", "job-2", "job-1", "job-0"]);
}

#[tokio::test(start_paused = true)]
async fn cancellation_only_relabels_units_still_running() {
    let aggregator = Aggregator::new(Scheduled::millis(&[10, 20, 30, 40, 50]));
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(25)).await;
        token.cancel();
    });

    let results = aggregator.aggregate(5, &cancel).await;

    assert_eq!(ids(&results), ["job-0", "job-1", "job-2", "job-3", "job-4"]);
    assert_eq!(
        states(&results),
        [
            UnitState::Completed,
            UnitState::Completed,
            UnitState::Canceled,
            UnitState::Canceled,
            UnitState::Canceled,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn abort_mode_stops_waiting_on_cancel() {
    let config = AggregatorConfig {
        cancel_mode: CancelMode::Abort,
        ..AggregatorConfig::default()
    };
    let aggregator = Aggregator::with_config(SimulatedWork::fixed(Duration::from_secs(10)), config);
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        token.cancel();
    });
    let start = Instant::now();

    let results = aggregator.aggregate(5, &cancel).await;

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.state() == UnitState::Canceled));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn concurrent_aggregations_do_not_interfere() {
    let aggregator = Aggregator::new(SimulatedWork::default());
    let live = CancellationToken::new();
    let cancelled = CancellationToken::new();
    cancelled.cancel();

    let (a, b) = tokio::join!(
        aggregator.aggregate(5, &live),
        aggregator.aggregate(3, &cancelled),
    );

    assert_eq!(a.len(), 5);
    assert_eq!(b.len(), 3);
    assert!(a.iter().all(|r| r.state() == UnitState::Completed));
    assert!(b.iter().all(|r| r.state() == UnitState::Canceled));

    let a_ids: HashSet<_> = ids(&a).into_iter().collect();
    let b_ids: HashSet<_> = ids(&b).into_iter().collect();
    assert_eq!(a_ids.len(), 5);
    assert_eq!(b_ids, HashSet::from(["job-0", "job-1", "job-2"]));
}

#[tokio::test(start_paused = true)]
async fn abandoned_collector_does_not_block_workers() {
    let finished = Arc::new(AtomicUsize::new(0));
    let aggregator = Aggregator::new(Counting {
        finished: Arc::clone(&finished),
    });

    let collector = aggregator.dispatch(5, &CancellationToken::new());
    drop(collector);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(finished.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn failing_units_report_failed() {
    let aggregator = Aggregator::new(Faulty);

    let mut results = aggregator.aggregate(4, &CancellationToken::new()).await;
    results.sort_by(|a, b| a.unit_id().cmp(b.unit_id()));

    assert_eq!(
        states(&results),
        [
            UnitState::Completed,
            UnitState::Failed,
            UnitState::Failed,
            UnitState::Completed,
        ]
    );
    assert!(results[1].message().contains("backend unreachable"));
    assert!(results[2].message().contains("worker panicked: boom"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_takes_precedence_over_failure() {
    let aggregator = Aggregator::new(Faulty);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = aggregator.aggregate(3, &cancel).await;

    assert!(results.iter().all(|r| r.state() == UnitState::Canceled));
}

#[tokio::test(start_paused = true)]
async fn unit_timeout_fails_slow_units() {
    let config = AggregatorConfig {
        unit_timeout: Some(Duration::from_millis(50)),
        ..AggregatorConfig::default()
    };
    let aggregator = Aggregator::with_config(Scheduled::millis(&[10, 100]), config);

    let results = aggregator.aggregate(2, &CancellationToken::new()).await;

    assert_eq!(ids(&results), ["job-0", "job-1"]);
    assert_eq!(states(&results), [UnitState::Completed, UnitState::Failed]);
    assert!(results[1].message().contains("timed out after 50ms"));
}

#[tokio::test(start_paused = true)]
async fn collect_within_reports_partial_aggregation() {
    let aggregator = Aggregator::new(Scheduled::millis(&[10, 20, 1_000]));

    let report = aggregator
        .dispatch(3, &CancellationToken::new())
        .collect_within(Duration::from_millis(100))
        .await;

    assert!(!report.is_complete());
    assert_eq!(report.received(), 2);
    assert_eq!(report.count(UnitState::Completed), 2);
    assert_eq!(
        report.ensure_complete(),
        Err(Error::PartialAggregation {
            received: 2,
            expected: 3,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn collector_tracks_progress_and_streams_in_arrival_order() {
    let aggregator = Aggregator::new(Scheduled::millis(&[30, 10, 20]));

    let mut collector = aggregator.dispatch(3, &CancellationToken::new());
    assert_eq!(collector.expected(), 3);
    let first = collector.next().await.unwrap();
    assert_eq!(first.unit_id(), "job-1");
    assert_eq!(collector.received(), 1);
    assert_eq!(collector.remaining(), 2);

    let rest: Vec<_> = collector.into_stream().collect().await;
    assert_eq!(ids(&rest), ["job-2", "job-0"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fans_out_across_worker_threads() {
    let work = SimulatedWork::new(Duration::from_millis(5), Duration::from_millis(15)).unwrap();
    let aggregator = Aggregator::new(work);

    let results = aggregator.aggregate(64, &CancellationToken::new()).await;

    let unique: HashSet<_> = ids(&results).into_iter().collect();
    assert_eq!(unique.len(), 64);
    assert!(results.iter().all(|r| r.state() == UnitState::Completed));
}
