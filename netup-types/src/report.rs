use crate::severity::Severity;
use crate::step::StepKind;
use crate::target::UpgradeTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured result of one upgrade run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeReport {
    pub schema: String,
    pub run: RunInfo,

    /// Absent when resolution produced no eligible target (no-op run).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<UpgradeTarget>,

    #[serde(default)]
    pub steps: Vec<StepOutcome>,

    pub aggregate: Severity,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl UpgradeReport {
    pub fn new(run: RunInfo) -> Self {
        Self {
            schema: crate::schema::NETUP_REPORT_V1.to_string(),
            run,
            target: None,
            steps: vec![],
            aggregate: Severity::None,
            warnings: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: uuid::Uuid,
    pub tool: ToolInfo,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// One executed step, as reflected in the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub id: String,
    pub title: String,
    pub kind: StepKind,
    pub severity: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_changed: Vec<FileChange>,
}

/// Record of one file touched by a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub sha256_before: String,
    pub sha256_after: String,
}
