//! Eligibility, ordering and the daily-build resolution path.

use crate::{ReleaseCandidate, ReleaseFeed, RequestedKind, ResolveError, SdkInstaller};
use chrono::{Datelike, NaiveDate, Weekday};
use netup_types::{Channel, ReleaseKind, SupportPhase, UpgradeTarget};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Days of support left at or below which a resolved target earns a
/// near-end-of-support warning.
const SUPPORT_WARNING_DAYS: i64 = 100;

pub struct ChannelResolver<'a> {
    feed: &'a dyn ReleaseFeed,
    installer: &'a dyn SdkInstaller,
    today: NaiveDate,
}

impl<'a> ChannelResolver<'a> {
    pub fn new(
        feed: &'a dyn ReleaseFeed,
        installer: &'a dyn SdkInstaller,
        today: NaiveDate,
    ) -> Self {
        Self {
            feed,
            installer,
            today,
        }
    }

    /// Pick the upgrade target, or `None` when nothing qualifies.
    ///
    /// Failures during candidate collection degrade to an empty candidate
    /// set; only cancellation is surfaced as an error.
    pub async fn resolve(
        &self,
        kind: RequestedKind,
        explicit: Option<Channel>,
        cancel: &CancellationToken,
    ) -> Result<Option<UpgradeTarget>, ResolveError> {
        if matches!(kind, RequestedKind::Daily) {
            return self.resolve_daily(cancel).await;
        }

        let candidates = self.feed.candidates(cancel).await?;
        debug!(total = candidates.len(), "collected release candidates");

        let eligible = candidates
            .into_iter()
            .filter(|c| c.support_phase != SupportPhase::EndOfLife)
            .filter(|c| is_eligible(c, kind, explicit));

        let chosen = match explicit {
            // Explicit requests take the first match in feed discovery
            // order; the feed publishes one entry per channel.
            Some(_) => eligible.into_iter().next(),
            None => eligible.max_by_key(|c| c.channel),
        };

        let Some(candidate) = chosen else {
            info!("no eligible upgrade channel found");
            return Ok(None);
        };

        info!(
            channel = %candidate.channel,
            sdk = %candidate.sdk_version,
            "resolved upgrade target"
        );
        Ok(Some(UpgradeTarget {
            channel: candidate.channel,
            sdk_version: candidate.sdk_version,
            release_kind: candidate.release_kind,
            support_phase: candidate.support_phase,
            eol_date: candidate.eol_date,
        }))
    }

    /// Development-build path: bypasses the candidate list, computes the
    /// in-development channel from the next release date, and asks the
    /// daily-build endpoint for the current SDK build.
    async fn resolve_daily(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<UpgradeTarget>, ResolveError> {
        let release_date = next_release_date(self.today);
        let channel = Channel::new((release_date.year() - 2015) as u16, 0);
        debug!(%channel, %release_date, "computed development channel");

        let Some(sdk_version) = self.feed.daily_sdk_version(channel, cancel).await? else {
            warn!(%channel, "daily build resolution failed; nothing to upgrade toward");
            return Ok(None);
        };

        if let Err(err) = self.installer.install(channel, &sdk_version, cancel).await {
            warn!(%channel, %sdk_version, "daily SDK install failed: {err:#}");
            return Ok(None);
        }

        info!(%channel, sdk = %sdk_version, "resolved daily build target");
        Ok(Some(UpgradeTarget {
            channel,
            sdk_version,
            release_kind: ReleaseKind::Preview,
            support_phase: SupportPhase::Preview,
            eol_date: None,
        }))
    }
}

fn is_eligible(
    candidate: &ReleaseCandidate,
    kind: RequestedKind,
    explicit: Option<Channel>,
) -> bool {
    if let Some(channel) = explicit {
        return candidate.channel == channel;
    }
    match kind {
        RequestedKind::Lts => {
            candidate.release_kind == ReleaseKind::Lts && !candidate.is_prerelease()
        }
        RequestedKind::Preview => candidate.is_prerelease(),
        RequestedKind::Latest => !candidate.is_prerelease(),
        RequestedKind::Daily => false,
    }
}

/// Support-window check: at most [`SUPPORT_WARNING_DAYS`] days of support
/// left surfaces a warning (never a failure).
pub fn support_window_warning(target: &UpgradeTarget, today: NaiveDate) -> Option<String> {
    let eol = target.eol_date?;
    let days_remaining = (eol - today).num_days();
    if days_remaining <= SUPPORT_WARNING_DAYS {
        Some(format!(
            "channel {} reaches end of support on {} ({} days away); plan the next upgrade soon",
            target.channel, eol, days_remaining
        ))
    } else {
        None
    }
}

/// The "Update Tuesday" a development channel ships on: the second Tuesday
/// of November, rolling into next year once this year's has passed.
pub fn second_update_tuesday(year: i32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, 11, 1).expect("November 1st exists");
    let days_until_tuesday =
        (7 + Weekday::Tue.num_days_from_monday() as i64 - first.weekday().num_days_from_monday() as i64) % 7;
    first + chrono::Days::new((days_until_tuesday + 7) as u64)
}

fn next_release_date(today: NaiveDate) -> NaiveDate {
    let this_year = second_update_tuesday(today.year());
    if today > this_year {
        second_update_tuesday(today.year() + 1)
    } else {
        this_year
    }
}
