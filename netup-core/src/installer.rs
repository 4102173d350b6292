//! Daily-build SDK installation hook.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use netup_process::CommandSpec;
use netup_releases::SdkInstaller;
use netup_types::Channel;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs a user-configured command to install a daily SDK build.
///
/// The install scripts themselves live outside this tool; the command line
/// is taken verbatim from configuration with `{channel}` and `{version}`
/// substituted. With no command configured the install is skipped, which
/// leaves the resolved target usable for rewriting but unprovisioned.
pub struct CommandSdkInstaller {
    command: Option<String>,
    working_dir: Utf8PathBuf,
}

impl CommandSdkInstaller {
    pub fn new(command: Option<String>, working_dir: Utf8PathBuf) -> Self {
        Self {
            command,
            working_dir,
        }
    }
}

#[async_trait]
impl SdkInstaller for CommandSdkInstaller {
    async fn install(
        &self,
        channel: Channel,
        version: &semver::Version,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let Some(template) = &self.command else {
            warn!(%channel, %version, "no SDK install command configured; skipping install");
            return Ok(());
        };

        let rendered = template
            .replace("{channel}", &channel.to_string())
            .replace("{version}", &version.to_string());
        let mut parts = rendered.split_whitespace();
        let Some(program) = parts.next() else {
            anyhow::bail!("SDK install command is empty after substitution");
        };
        let spec = CommandSpec::new(program)
            .args(parts)
            .current_dir(self.working_dir.clone());

        info!(command = %rendered, "installing daily SDK build");
        let output = netup_process::run(&spec, cancel).await?;
        if !output.success() {
            anyhow::bail!(
                "SDK install command exited with code {}: {}",
                output.exit_code,
                output.stderr.trim()
            );
        }
        Ok(())
    }
}
