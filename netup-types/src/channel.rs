use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A two-part release-channel version (`major.minor`, e.g. `8.0`).
///
/// Channels are the unit of upgrade resolution: a run upgrades a project
/// tree *toward* exactly one channel. Ordering is lexicographic on
/// `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel {
    pub major: u16,
    pub minor: u16,
}

impl Channel {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid channel version '{input}': expected <major>.<minor>")]
pub struct ChannelParseError {
    pub input: String,
}

impl FromStr for Channel {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ChannelParseError {
            input: s.to_string(),
        };
        let (major, minor) = s.split_once('.').ok_or_else(err)?;
        // Reject "8.0.1" and empty parts; both digits-only.
        if major.is_empty()
            || minor.is_empty()
            || !major.bytes().all(|b| b.is_ascii_digit())
            || !minor.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }
        Ok(Self {
            major: major.parse().map_err(|_| err())?,
            minor: minor.parse().map_err(|_| err())?,
        })
    }
}

impl Serialize for Channel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
