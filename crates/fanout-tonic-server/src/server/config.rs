use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use core::time::Duration;
use fanout::{AggregatorConfig, CancelMode};
use std::net::SocketAddr;

/// How a unit reacts when its request is cancelled mid-work.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelModeArg {
    /// Finish the work, then report the unit as canceled.
    #[default]
    Relabel,
    /// Stop waiting immediately and report the unit as canceled.
    Abort,
}

impl From<CancelModeArg> for CancelMode {
    fn from(arg: CancelModeArg) -> Self {
        match arg {
            CancelModeArg::Relabel => Self::Relabel,
            CancelModeArg::Abort => Self::Abort,
        }
    }
}

/// Runtime configuration for the `fanout-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first), with defaults matching the reference behavior: five
/// units per status request, each simulating 10-20 seconds of work.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fanout-tonic-server",
    version,
    about = "A gRPC + REST service fanning status requests out into cancellable units"
)]
pub struct CliArgs {
    /// Address the gRPC server listens on.
    ///
    /// Environment variable: `GRPC_ADDR`
    #[arg(long, env = "GRPC_ADDR", default_value_t = String::from("127.0.0.1:8080"))]
    pub grpc_addr: String,

    /// Address the REST gateway listens on.
    ///
    /// Environment variable: `REST_ADDR`
    #[arg(long, env = "REST_ADDR", default_value_t = String::from("127.0.0.1:8090"))]
    pub rest_addr: String,

    /// Number of units fanned out when a status request doesn't specify one.
    ///
    /// Environment variable: `STATUS_UNITS`
    #[arg(long, env = "STATUS_UNITS", default_value_t = 5)]
    pub status_units: usize,

    /// Maximum number of units a single status request may ask for.
    ///
    /// Every unit is its own task holding a slot in the result queue, so this
    /// bounds per-request memory.
    ///
    /// Environment variable: `MAX_STATUS_UNITS`
    #[arg(long, env = "MAX_STATUS_UNITS", default_value_t = 1000)]
    pub max_status_units: usize,

    /// Lower bound (inclusive) of each unit's simulated work, in milliseconds.
    ///
    /// Environment variable: `WORK_MIN_MS`
    #[arg(long, env = "WORK_MIN_MS", default_value_t = 10_000)]
    pub work_min_ms: u64,

    /// Upper bound (exclusive) of each unit's simulated work, in milliseconds.
    ///
    /// Environment variable: `WORK_MAX_MS`
    #[arg(long, env = "WORK_MAX_MS", default_value_t = 20_000)]
    pub work_max_ms: u64,

    /// What a unit does when its request is cancelled while it is working.
    ///
    /// Environment variable: `CANCEL_MODE`
    #[arg(long, env = "CANCEL_MODE", value_enum, default_value_t = CancelModeArg::Relabel)]
    pub cancel_mode: CancelModeArg,

    /// Per-unit work limit in milliseconds. Slower units report as failed.
    ///
    /// Environment variable: `UNIT_TIMEOUT_MS`
    #[arg(long, env = "UNIT_TIMEOUT_MS")]
    pub unit_timeout_ms: Option<u64>,

    /// Governing timeout for a whole status request, in milliseconds. When it
    /// elapses the request is cancelled.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Stop collecting after this many milliseconds and reply with whatever
    /// arrived (a partial report).
    ///
    /// Environment variable: `COLLECT_DEADLINE_MS`
    #[arg(long, env = "COLLECT_DEADLINE_MS")]
    pub collect_deadline_ms: Option<u64>,

    /// Fail a status request with a deadline error instead of replying with a
    /// partial report when the collection deadline elapses.
    ///
    /// Environment variable: `REQUIRE_COMPLETE`
    #[arg(long, env = "REQUIRE_COMPLETE")]
    pub require_complete: bool,

    /// Seconds to wait for in-flight status requests to drain on shutdown
    /// before cancelling them.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub grpc_addr: SocketAddr,
    pub rest_addr: SocketAddr,
    pub status_units: usize,
    pub max_status_units: usize,
    pub work_min: Duration,
    pub work_max: Duration,
    pub aggregator: AggregatorConfig,
    pub request_timeout: Option<Duration>,
    pub collect_deadline: Option<Duration>,
    pub require_complete: bool,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let grpc_addr = args
            .grpc_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("GRPC_ADDR ({}) is not a socket address", args.grpc_addr))?;
        let rest_addr = args
            .rest_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("REST_ADDR ({}) is not a socket address", args.rest_addr))?;

        if grpc_addr == rest_addr {
            bail!("GRPC_ADDR and REST_ADDR must differ (both {grpc_addr})");
        }

        if args.max_status_units == 0 {
            bail!("MAX_STATUS_UNITS must be greater than 0");
        }

        if args.status_units > args.max_status_units {
            bail!(
                "STATUS_UNITS ({}) exceeds MAX_STATUS_UNITS ({})",
                args.status_units,
                args.max_status_units
            );
        }

        if args.work_min_ms > args.work_max_ms {
            bail!(
                "WORK_MIN_MS ({}) must not exceed WORK_MAX_MS ({})",
                args.work_min_ms,
                args.work_max_ms
            );
        }

        Ok(Self {
            grpc_addr,
            rest_addr,
            status_units: args.status_units,
            max_status_units: args.max_status_units,
            work_min: Duration::from_millis(args.work_min_ms),
            work_max: Duration::from_millis(args.work_max_ms),
            aggregator: AggregatorConfig {
                cancel_mode: args.cancel_mode.into(),
                unit_timeout: non_zero_millis("UNIT_TIMEOUT_MS", args.unit_timeout_ms)?,
            },
            request_timeout: non_zero_millis("REQUEST_TIMEOUT_MS", args.request_timeout_ms)?,
            collect_deadline: non_zero_millis("COLLECT_DEADLINE_MS", args.collect_deadline_ms)?,
            require_complete: args.require_complete,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

fn non_zero_millis(name: &str, value: Option<u64>) -> anyhow::Result<Option<Duration>> {
    match value {
        Some(0) => bail!("{name} must be greater than 0 when set"),
        other => Ok(other.map(Duration::from_millis)),
    }
}

#[cfg(test)]
impl ServerConfig {
    /// A config with millisecond-scale work, for handler tests.
    pub fn for_tests() -> Self {
        Self {
            grpc_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            rest_addr: SocketAddr::from(([127, 0, 0, 1], 1)),
            status_units: 5,
            max_status_units: 10,
            work_min: Duration::from_millis(5),
            work_max: Duration::from_millis(15),
            aggregator: AggregatorConfig::default(),
            request_timeout: None,
            collect_deadline: None,
            require_complete: false,
            shutdown_timeout: Duration::from_millis(200),
        }
    }
}
