//! Post-processing verification: run the configured build/test command and
//! map its outcome onto the severity lattice.

use crate::{StepContext, StepReport, UpgradeStep};
use async_trait::async_trait;
use netup_process::{CommandSpec, ProcessError};
use netup_types::{Severity, StepDescriptor};
use tracing::info;

pub struct VerifyStep;

fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[async_trait]
impl UpgradeStep for VerifyStep {
    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::post_processor("verify.command", "Verification command", 100)
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<StepReport> {
        let Some(command_line) = &ctx.settings.verify_command else {
            return Ok(StepReport::none());
        };

        let mut parts = command_line.split_whitespace();
        let Some(program) = parts.next() else {
            return Ok(StepReport::none());
        };
        let spec = CommandSpec::new(program)
            .args(parts)
            .current_dir(ctx.repo_root.clone());

        info!(command = %command_line, "running verification command");
        let output = match netup_process::run(&spec, &ctx.cancel).await {
            Ok(output) => output,
            Err(err @ ProcessError::Cancelled { .. }) => return Err(err.into()),
            Err(err) => {
                // Spawn failures are this step's failure, not the run's.
                return Ok(StepReport {
                    severity: Severity::Error,
                    message: Some(format!("verification command failed to start: {err}")),
                    files_changed: vec![],
                });
            }
        };

        if output.success() {
            return Ok(StepReport {
                severity: Severity::Success,
                message: Some(format!("'{command_line}' passed")),
                files_changed: vec![],
            });
        }

        // The runner only distinguishes zero from non-zero; deciding that a
        // non-zero exit is an error here is this step's call.
        Ok(StepReport {
            severity: Severity::Error,
            message: Some(format!(
                "'{command_line}' exited with code {}\nstdout (tail):\n{}\nstderr (tail):\n{}",
                output.exit_code,
                tail(&output.stdout, 20),
                tail(&output.stderr, 20),
            )),
            files_changed: vec![],
        })
    }
}
