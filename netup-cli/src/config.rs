//! Configuration file loading for netup.
//!
//! Discovers and loads `netup.toml` from the repository root and merges it
//! with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::Utf8Path;
use fs_err as fs;
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "netup.toml";

/// Top-level configuration from netup.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetupConfig {
    pub upgrade: UpgradeConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Requested kind: `latest`, `lts`, `preview`, `daily`.
    pub kind: Option<String>,

    /// Explicit channel, e.g. `"9.0"`.
    pub channel: Option<String>,

    pub fail_on_warnings: bool,

    /// Post-upgrade verification command, e.g. `"dotnet build"`.
    pub verify_command: Option<String>,

    /// Install hook for daily builds; `{channel}`/`{version}` substituted.
    pub sdk_install_command: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub index_url: Option<String>,
    pub daily_base_url: Option<String>,
}

pub fn load_or_default(repo_root: &Utf8Path) -> anyhow::Result<NetupConfig> {
    let path = repo_root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        debug!("no config file at {path}");
        return Ok(NetupConfig::default());
    }
    debug!("loading config from {path}");
    let contents = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
    toml::from_str(&contents).with_context(|| format!("parse {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_config() {
        let config: NetupConfig = toml::from_str(
            r#"
            [upgrade]
            kind = "lts"
            fail_on_warnings = true
            verify_command = "dotnet build"

            [feed]
            index_url = "https://mirror.example/releases-index.json"
            "#,
        )
        .expect("parse");

        assert_eq!(config.upgrade.kind.as_deref(), Some("lts"));
        assert!(config.upgrade.fail_on_warnings);
        assert_eq!(config.upgrade.verify_command.as_deref(), Some("dotnet build"));
        assert_eq!(
            config.feed.index_url.as_deref(),
            Some("https://mirror.example/releases-index.json")
        );
        assert!(config.feed.daily_base_url.is_none());
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let config: NetupConfig = toml::from_str("").expect("parse");
        assert!(config.upgrade.kind.is_none());
        assert!(!config.upgrade.fail_on_warnings);
    }
}
