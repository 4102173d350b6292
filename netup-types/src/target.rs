use crate::channel::Channel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Support model of a release line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Lts,
    Sts,
    Preview,
}

/// Lifecycle stage of a channel, as spelled by the release-index feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportPhase {
    Preview,
    GoLive,
    Active,
    Maintenance,
    #[serde(rename = "eol")]
    EndOfLife,
}

/// The resolved upgrade destination for one run.
///
/// Created once by channel resolution, then consumed read-only by every
/// step; nothing mutates it after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeTarget {
    pub channel: Channel,
    pub sdk_version: semver::Version,
    pub release_kind: ReleaseKind,
    pub support_phase: SupportPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eol_date: Option<NaiveDate>,
}

impl UpgradeTarget {
    /// Whether the resolved SDK is a prerelease build.
    pub fn is_prerelease(&self) -> bool {
        !self.sdk_version.pre.is_empty()
    }

    /// Target-framework tag for this channel (e.g. `net8.0`).
    pub fn framework_tag(&self) -> String {
        format!("net{}", self.channel)
    }
}
