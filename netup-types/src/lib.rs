//! Shared DTOs (schemas-as-code) for the netup workspace.
//!
//! # Design constraints
//! - The report types are serialized to disk and to CI summaries.
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod channel;
pub mod report;
pub mod severity;
pub mod step;
pub mod target;

pub use channel::{Channel, ChannelParseError};
pub use severity::Severity;
pub use step::{StepDescriptor, StepKind};
pub use target::{ReleaseKind, SupportPhase, UpgradeTarget};

/// Schema identifiers.
pub mod schema {
    pub const NETUP_REPORT_V1: &str = "netup.report.v1";
}
