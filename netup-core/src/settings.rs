//! Clap-free settings for the upgrade pipeline.

use camino::Utf8PathBuf;
use netup_releases::RequestedKind;
use netup_types::Channel;

/// Everything one run needs to know, merged from CLI flags and the config
/// file before the pipeline starts.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub repo_root: Utf8PathBuf,

    // Target selection
    pub requested: RequestedKind,
    pub explicit_channel: Option<Channel>,

    // Outcome policy
    pub fail_on_warnings: bool,

    // Post-processing
    pub verify_command: Option<String>,

    // Daily-build installation hook; `{channel}` and `{version}`
    // placeholders are substituted.
    pub sdk_install_command: Option<String>,

    // Feed endpoints (overridable for mirrors and tests)
    pub index_url: String,
    pub daily_build_base_url: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            repo_root: Utf8PathBuf::from("."),
            requested: RequestedKind::Latest,
            explicit_channel: None,
            fail_on_warnings: false,
            verify_command: None,
            sdk_install_command: None,
            index_url:
                "https://builds.dotnet.microsoft.com/dotnet/release-metadata/releases-index.json"
                    .to_string(),
            daily_build_base_url: "https://aka.ms/dotnet".to_string(),
        }
    }
}
