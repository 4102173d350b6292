//! Release metadata access and upgrade-channel resolution.
//!
//! The resolver decides *which* channel a run upgrades toward. All network
//! and parse failures degrade (a skipped entry, an empty candidate set, a
//! `None` target) rather than erroring; the single structured exception is
//! cancellation, which always propagates.

pub mod index;
pub mod resolver;

pub use index::{HttpReleaseFeed, ReleaseCandidate, parse_index};
pub use resolver::{ChannelResolver, second_update_tuesday, support_window_warning};

use async_trait::async_trait;
use netup_types::Channel;
use tokio_util::sync::CancellationToken;

/// What kind of target the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestedKind {
    /// Newest non-prerelease channel.
    #[default]
    Latest,
    /// Newest non-prerelease LTS channel.
    Lts,
    /// Newest prerelease channel.
    Preview,
    /// Development builds; bypasses the candidate list entirely.
    Daily,
}

/// The only error resolution surfaces; everything else degrades to `None`.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("channel resolution cancelled")]
    Cancelled,
}

/// Source of release metadata.
///
/// Split out as a port so the resolver's eligibility and ordering rules are
/// testable against an in-memory feed.
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// All published candidates; total failure is an empty list, not an
    /// error.
    async fn candidates(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReleaseCandidate>, ResolveError>;

    /// Current daily-build SDK version for a development channel; `None` on
    /// any metadata problem.
    async fn daily_sdk_version(
        &self,
        channel: Channel,
        cancel: &CancellationToken,
    ) -> Result<Option<semver::Version>, ResolveError>;
}

/// Side-effect hook fired when the daily path resolves a build that is not
/// installed locally. The install scripts themselves are external; this
/// trait is the seam they hang off.
#[async_trait]
pub trait SdkInstaller: Send + Sync {
    async fn install(
        &self,
        channel: Channel,
        version: &semver::Version,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;
}
