//! Fan-out/fan-in over a capacity-matched result queue.
//!
//! [`Aggregator::dispatch`] spawns one worker task per unit and hands back a
//! [`ResultCollector`] that owns the receiving end of the queue. Each worker
//! runs its [`Workload`](crate::Workload), checks the caller's
//! [`CancellationToken`](tokio_util::sync::CancellationToken) once, and sends
//! exactly one [`StatusResult`](crate::StatusResult).
//!
//! ## Structure
//!
//! - [`aggregator`] - dispatch and the `aggregate` contract.
//! - [`collector`] - the consumer side and [`AggregateReport`].
//! - `worker` - the per-unit check-then-emit task.

mod aggregator;
mod collector;
mod worker;

pub use aggregator::*;
pub use collector::*;

#[cfg(test)]
mod tests;
