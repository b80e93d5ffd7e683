//! # Conversions between `fanout` results and protobuf messages
//!
//! The server produces [`StatusResult`]s and [`AggregateReport`]s; these impls
//! turn them into the wire types of [`crate::proto`]. The reverse direction
//! ([`unit_state`]) is what clients use to decode the `state` field, which
//! prost stores as a raw `i32`.

use crate::proto;
use fanout::{AggregateReport, StatusResult, UnitState};

impl From<UnitState> for proto::UnitState {
    fn from(state: UnitState) -> Self {
        match state {
            UnitState::Completed => Self::Completed,
            UnitState::Canceled => Self::Canceled,
            UnitState::Failed => Self::Failed,
        }
    }
}

impl From<&StatusResult> for proto::UnitStatus {
    fn from(result: &StatusResult) -> Self {
        Self {
            unit_id: result.unit_id().to_owned(),
            state: proto::UnitState::from(result.state()).into(),
            message: result.message().to_owned(),
        }
    }
}

impl From<StatusResult> for proto::UnitStatus {
    fn from(result: StatusResult) -> Self {
        Self::from(&result)
    }
}

impl From<AggregateReport> for proto::StatusReply {
    fn from(report: AggregateReport) -> Self {
        let partial = !report.is_complete();
        let expected = u32::try_from(report.expected()).unwrap_or(u32::MAX);
        Self {
            results: report
                .into_results()
                .into_iter()
                .map(proto::UnitStatus::from)
                .collect(),
            expected,
            partial,
        }
    }
}

/// Decodes the raw `state` field of a [`proto::UnitStatus`].
///
/// Returns `None` for `UNIT_STATE_UNSPECIFIED` and for unknown values.
pub fn unit_state(raw: i32) -> Option<UnitState> {
    match proto::UnitState::try_from(raw).ok()? {
        proto::UnitState::Completed => Some(UnitState::Completed),
        proto::UnitState::Canceled => Some(UnitState::Canceled),
        proto::UnitState::Failed => Some(UnitState::Failed),
        proto::UnitState::Unspecified => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout::WorkUnit;

    #[test]
    fn report_keeps_arrival_order_and_partial_flag() {
        let results = vec![
            StatusResult::canceled(&WorkUnit::new(2)),
            StatusResult::completed(&WorkUnit::new(0)),
        ];
        let reply = proto::StatusReply::from(AggregateReport::new(results, 3));

        assert_eq!(reply.expected, 3);
        assert!(reply.partial);
        assert_eq!(reply.results[0].unit_id, "job-2");
        assert_eq!(reply.results[0].state(), proto::UnitState::Canceled);
        assert_eq!(reply.results[1].state(), proto::UnitState::Completed);
        assert_eq!(reply.results[1].message, "Status for 'job-0'");
    }

    #[test]
    fn decodes_raw_states() {
        assert_eq!(
            unit_state(proto::UnitState::Failed.into()),
            Some(UnitState::Failed)
        );
        assert_eq!(unit_state(0), None);
        assert_eq!(unit_state(42), None);
    }
}
