//! gRPC status aggregation service.
//!
//! [`StatusService`] implements the [`StatusAggregator`] service from the
//! protobuf schema and is shared with the REST gateway. Every call fans out
//! into a fresh set of units through a [`StatusRun`], whose request token is
//! cancelled when the run is dropped (client disconnect, gRPC deadline, or a
//! dropped response stream), when the optional governing timeout elapses, or
//! when the server shuts down.

use super::lifecycle::{InflightGuard, Lifecycle};
use crate::server::{
    config::ServerConfig,
    telemetry::{
        increment_partial_aggregations, increment_request_errors, increment_requests,
        record_aggregation_duration, record_unit_outcome, record_units_per_request,
    },
};
use core::{pin::Pin, time::Duration};
use fanout::{AggregateReport, Aggregator, ResultCollector, SimulatedWork, StatusResult};
use fanout_tonic_core::{
    Error,
    proto::{StatusReply, StatusRequest, UnitStatus, status_aggregator_server::StatusAggregator},
};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::time::{Instant, sleep, timeout_at};
#[cfg(test)]
use tokio_util::sync::CancellationToken;
use tokio_util::sync::DropGuard;
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct StatusService {
    aggregator: Aggregator<SimulatedWork>,
    default_units: usize,
    max_units: usize,
    request_timeout: Option<Duration>,
    collect_deadline: Option<Duration>,
    require_complete: bool,
    lifecycle: Arc<Lifecycle>,
    // Every request token handed out, so tests can observe cancellation.
    #[cfg(test)]
    issued: Arc<std::sync::Mutex<Vec<CancellationToken>>>,
}

impl StatusService {
    /// Builds the service from a validated [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aggregation`] if the configured work range is
    /// inverted.
    pub fn new(config: &ServerConfig) -> Result<Self, Error> {
        let workload = SimulatedWork::new(config.work_min, config.work_max)?;
        Ok(Self {
            aggregator: Aggregator::with_config(workload, config.aggregator),
            default_units: config.status_units,
            max_units: config.max_status_units,
            request_timeout: config.request_timeout,
            collect_deadline: config.collect_deadline,
            require_complete: config.require_complete,
            lifecycle: Arc::new(Lifecycle::new(config.shutdown_timeout)),
            #[cfg(test)]
            issued: Arc::default(),
        })
    }

    /// Applies the server default and the per-request cap.
    pub fn resolve_units(&self, requested: Option<u32>) -> Result<usize, Error> {
        let Some(requested) = requested else {
            return Ok(self.default_units);
        };
        let units = usize::try_from(requested).unwrap_or(usize::MAX);
        if units > self.max_units {
            return Err(Error::invalid_request(format!(
                "units must be at most {}, got {requested}",
                self.max_units
            )));
        }
        Ok(units)
    }

    /// Admits a request and dispatches its units.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] when `units` exceeds the configured cap.
    /// - [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn begin(&self, units: Option<u32>) -> Result<StatusRun, Error> {
        increment_requests();
        let admitted = self
            .resolve_units(units)
            .and_then(|units| Ok((units, self.lifecycle.enter()?)));
        let (units, (token, inflight)) = admitted.inspect_err(|_| increment_request_errors())?;

        if let Some(limit) = self.request_timeout {
            let timer = token.clone();
            tokio::spawn(async move {
                if timer.run_until_cancelled(sleep(limit)).await.is_some() {
                    tracing::debug!("Request timeout of {limit:?} elapsed, cancelling units");
                    timer.cancel();
                }
            });
        }

        record_units_per_request(units as f64);
        tracing::debug!("Fanning out {units} units");

        #[cfg(test)]
        self.issued.lock().unwrap().push(token.clone());

        Ok(StatusRun {
            collector: self.aggregator.dispatch(units, &token),
            deadline: self.collect_deadline.map(|limit| Instant::now() + limit),
            require_complete: self.require_complete,
            start: Instant::now(),
            _cancel_on_drop: token.drop_guard(),
            _inflight: inflight,
        })
    }

    /// Runs one aggregation to completion (or to the collection deadline).
    pub async fn aggregate(&self, units: Option<u32>) -> Result<AggregateReport, Error> {
        self.begin(units)?.finish().await
    }

    /// Refuses new requests, drains in-flight ones, then cancels the rest.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }
}

/// One admitted status request.
///
/// Dropping a run before it finishes cancels its units.
pub struct StatusRun {
    collector: ResultCollector,
    deadline: Option<Instant>,
    require_complete: bool,
    start: Instant,
    _cancel_on_drop: DropGuard,
    _inflight: InflightGuard,
}

impl StatusRun {
    pub const fn expected(&self) -> usize {
        self.collector.expected()
    }

    /// Waits for every unit, or for the collection deadline if one is set.
    ///
    /// # Errors
    ///
    /// Returns [`fanout::Error::PartialAggregation`] when the deadline cut the
    /// collection short and complete results are required.
    pub async fn finish(self) -> Result<AggregateReport, Error> {
        let report = match self.deadline {
            Some(deadline) => {
                let limit = deadline.saturating_duration_since(Instant::now());
                self.collector.collect_within(limit).await
            }
            None => self.collector.collect().await,
        };

        for result in report.results() {
            record_unit_outcome(result.state());
        }
        if !report.is_complete() {
            increment_partial_aggregations();
        }
        record_aggregation_duration(self.start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            "Aggregated {}/{} results in {:?}",
            report.received(),
            report.expected(),
            self.start.elapsed()
        );

        if self.require_complete {
            let expected = report.expected();
            let results = report
                .ensure_complete()
                .inspect_err(|_| increment_request_errors())?;
            return Ok(AggregateReport::new(results, expected));
        }
        Ok(report)
    }

    /// Yields results as units finish. The stream ends after the last unit or
    /// at the collection deadline; in the latter case it ends with an error
    /// when complete results are required.
    pub fn into_stream(self) -> impl Stream<Item = Result<StatusResult, Error>> + Send + 'static {
        futures::stream::unfold(Some(self), |state| async move {
            let mut run = state?;
            let next = match run.deadline {
                Some(deadline) => timeout_at(deadline, run.collector.next()).await.ok().flatten(),
                None => run.collector.next().await,
            };
            if let Some(result) = next {
                record_unit_outcome(result.state());
                return Some((Ok(result), Some(run)));
            }

            record_aggregation_duration(run.start.elapsed().as_secs_f64() * 1000.0);
            if run.collector.is_done() {
                return None;
            }
            increment_partial_aggregations();
            if !run.require_complete {
                return None;
            }
            increment_request_errors();
            let short = fanout::Error::PartialAggregation {
                received: run.collector.received(),
                expected: run.collector.expected(),
            };
            Some((Err(short.into()), None))
        })
    }
}

#[tonic::async_trait]
impl StatusAggregator for StatusService {
    type StreamStatusStream = Pin<Box<dyn Stream<Item = Result<UnitStatus, Status>> + Send>>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(units = ?req.get_ref().units)))]
    async fn get_status(
        &self,
        req: Request<StatusRequest>,
    ) -> Result<Response<StatusReply>, Status> {
        let report = self.aggregate(req.into_inner().units).await?;
        Ok(Response::new(report.into()))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(units = ?req.get_ref().units)))]
    async fn stream_status(
        &self,
        req: Request<StatusRequest>,
    ) -> Result<Response<Self::StreamStatusStream>, Status> {
        let run = self.begin(req.into_inner().units)?;
        tracing::debug!("Streaming {} units", run.expected());
        let stream = run
            .into_stream()
            .map(|item| item.map(UnitStatus::from).map_err(Status::from));
        Ok(Response::new(Box::pin(stream)))
    }
}
