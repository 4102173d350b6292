use serde::{Deserialize, Serialize};

/// Phase a step belongs to.
///
/// All `Upgrader` steps complete before any `PostProcessor` starts;
/// post-processors only run when an upgrader actually changed something and
/// nothing fatal occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Upgrader,
    PostProcessor,
}

/// Identity and scheduling data for a pipeline step.
///
/// Steps execute in ascending `order` within their kind; steps sharing an
/// `order` value may run in any relative order among themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Stable identifier, e.g. `project.tfm`.
    pub id: String,
    /// Human-readable title for reports.
    pub title: String,
    pub order: i32,
    pub kind: StepKind,
}

impl StepDescriptor {
    pub fn upgrader(id: &str, title: &str, order: i32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            order,
            kind: StepKind::Upgrader,
        }
    }

    pub fn post_processor(id: &str, title: &str, order: i32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            order,
            kind: StepKind::PostProcessor,
        }
    }
}
