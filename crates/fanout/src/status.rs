use crate::Error;
use core::fmt;

/// A single unit of fanned-out work.
///
/// Units are identified by their dispatch index and carry a display id of the
/// form `job-<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkUnit {
    index: usize,
    id: String,
}

impl WorkUnit {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            id: format!("job-{index}"),
        }
    }

    /// Position of the unit in dispatch order.
    pub const fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// The verdict a unit reports once its work has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum UnitState {
    /// The work finished and the owning request was still live.
    Completed,
    /// The owning request was cancelled by the time the unit checked in.
    Canceled,
    /// The workload returned an error, timed out, or panicked.
    Failed,
}

impl UnitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome record for one [`WorkUnit`].
///
/// Exactly one `StatusResult` is produced per unit. The record is immutable
/// once created: fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatusResult {
    unit_id: String,
    state: UnitState,
    message: String,
}

impl StatusResult {
    pub fn completed(unit: &WorkUnit) -> Self {
        Self {
            unit_id: unit.id().to_owned(),
            state: UnitState::Completed,
            message: format!("Status for '{}'", unit.id()),
        }
    }

    pub fn canceled(unit: &WorkUnit) -> Self {
        Self {
            unit_id: unit.id().to_owned(),
            state: UnitState::Canceled,
            message: format!("Status canceled for '{}'", unit.id()),
        }
    }

    pub fn failed(unit: &WorkUnit, err: &Error) -> Self {
        Self {
            unit_id: unit.id().to_owned(),
            state: UnitState::Failed,
            message: format!("Status failed for '{}': {err}", unit.id()),
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub const fn state(&self) -> UnitState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_ids_follow_dispatch_index() {
        let unit = WorkUnit::new(3);
        assert_eq!(unit.index(), 3);
        assert_eq!(unit.id(), "job-3");
    }

    #[test]
    fn verdict_messages_name_the_unit() {
        let unit = WorkUnit::new(0);
        assert_eq!(StatusResult::completed(&unit).message(), "Status for 'job-0'");
        assert_eq!(
            StatusResult::canceled(&unit).message(),
            "Status canceled for 'job-0'"
        );

        let err = Error::worker_failure("job-0", "backend unreachable");
        let failed = StatusResult::failed(&unit, &err);
        assert_eq!(failed.state(), UnitState::Failed);
        assert!(failed.message().ends_with("backend unreachable"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_state_in_snake_case() {
        let json = serde_json::to_value(StatusResult::canceled(&WorkUnit::new(7))).unwrap();
        assert_eq!(json["unit_id"], "job-7");
        assert_eq!(json["state"], "canceled");
    }
}
