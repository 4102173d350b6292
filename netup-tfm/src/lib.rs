//! Algebra over multi-value target-framework tag lists.
//!
//! A tag list is a `;`-delimited string such as `net6.0` or
//! `netstandard2.0;net6.0;net7.0`. Entries are either *versioned*
//! (`net<major>.<minor>`, upgradeable) or *legacy pass-through*
//! (`netstandard2.0`, `netcoreapp3.1`, `net472`, ...) which an upgrade must
//! leave untouched. Anything else makes the whole list unrecognizable and
//! the operation fails without partial edits.

use netup_types::Channel;
use thiserror::Error;
use tracing::trace;

/// Result of a successful upgrade attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgraded {
    /// False when the rewritten list equals the input.
    pub changed: bool,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TfmError {
    #[error("unrecognized target framework entry '{entry}'")]
    Unrecognized { entry: String },

    #[error("entry '{entry}' is already at or beyond channel {target}")]
    AlreadyCurrent { entry: String, target: Channel },

    #[error("no upgradeable entries in '{list}'")]
    NothingToUpgrade { list: String },
}

/// One parsed tag-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Versioned { channel: Channel },
    PassThrough,
}

/// Prefixes of entries that are valid but never rewritten.
const PASS_THROUGH_PREFIXES: &[&str] = &["netstandard", "netcoreapp"];

fn parse_entry(entry: &str) -> Option<Entry> {
    if let Some(rest) = entry.strip_prefix("net") {
        if let Ok(channel) = rest.parse::<Channel>() {
            return Some(Entry::Versioned { channel });
        }
        // .NET Framework monikers (net35, net472, net481): two or more
        // digits, no dot.
        if rest.len() >= 2 && rest.bytes().all(|b| b.is_ascii_digit()) {
            return Some(Entry::PassThrough);
        }
    }
    if PASS_THROUGH_PREFIXES.iter().any(|p| entry.starts_with(p)) {
        return Some(Entry::PassThrough);
    }
    None
}

/// The tag spelling for a channel, e.g. `net8.0`.
pub fn tag_for(channel: Channel) -> String {
    format!("net{channel}")
}

/// Rewrite `list` so it targets `target`.
///
/// - Every non-empty segment must parse; otherwise the whole operation
///   fails and the caller makes no edit.
/// - Every versioned entry must be strictly below `target`; a
///   newer-or-equal entry fails the operation rather than silently
///   downgrading or no-opping a mixed list.
/// - At least one versioned entry is required.
/// - A single-entry list is replaced outright; a multi-entry list gains the
///   new tag alongside the existing entries, prepended when the list reads
///   descending and appended otherwise.
pub fn try_upgrade(list: &str, target: Channel) -> Result<Upgraded, TfmError> {
    let mut valid = 0usize;
    let mut upgradeable: Vec<Channel> = Vec::new();

    for segment in list.split(';') {
        if segment.is_empty() {
            continue;
        }
        let entry = parse_entry(segment).ok_or_else(|| TfmError::Unrecognized {
            entry: segment.to_string(),
        })?;
        valid += 1;

        if let Entry::Versioned { channel } = entry {
            if channel >= target {
                return Err(TfmError::AlreadyCurrent {
                    entry: segment.to_string(),
                    target,
                });
            }
            upgradeable.push(channel);
        }
    }

    if upgradeable.is_empty() {
        return Err(TfmError::NothingToUpgrade {
            list: list.to_string(),
        });
    }

    let new_tag = tag_for(target);
    let value = if valid == 1 {
        new_tag
    } else {
        // Preserve the apparent sort direction of the list.
        let descending = upgradeable.len() >= 2 && upgradeable[0] > upgradeable[1];
        if descending {
            format!("{new_tag};{list}")
        } else {
            format!("{list};{new_tag}")
        }
    };

    let changed = value != list;
    trace!(%list, %target, %value, changed, "tag list upgrade");
    Ok(Upgraded { changed, value })
}
