use serde::{Deserialize, Serialize};

/// Aggregate outcome of a step or of a whole run.
///
/// The variants form a totally ordered join-semilattice; a pipeline's state
/// is the running [`join`](Severity::join) (max) of every step result, so it
/// never decreases as steps execute. `None` means the step had nothing to do,
/// which keeps a later no-op step from masking an earlier warning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// Join (max) of two severities.
    #[must_use]
    pub fn join(self, other: Severity) -> Severity {
        self.max(other)
    }

    /// True when the severity represents a change having been made.
    pub fn changed_something(self) -> bool {
        matches!(self, Severity::Success | Severity::Warning)
    }
}
