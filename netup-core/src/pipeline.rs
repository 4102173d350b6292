//! The upgrade pipeline: resolve a target, run the steps, aggregate, report.
//!
//! Run phases: resolving → (no target | running) → post-processing →
//! reporting. A step failure is caught, recorded as `Error`, and the run
//! continues; cancellation is the one exception and aborts immediately.

use crate::settings::RunSettings;
use anyhow::Context;
use chrono::Utc;
use netup_releases::{ChannelResolver, ReleaseFeed, ResolveError, SdkInstaller, support_window_warning};
use netup_rid::PortabilityGraph;
use netup_steps::{
    ChangedFile, RunCache, StepContext, StepSettings, UpgradeStep, builtin_steps, discover_projects,
};
use netup_types::report::{RunInfo, StepOutcome, ToolInfo, UpgradeReport};
use netup_types::{Severity, StepKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a finished (or cleanly empty) run hands back to the CLI.
pub struct RunOutcome {
    pub report: UpgradeReport,
    /// Unified diff of every file the run changed.
    pub patch: String,
    pub exit_code: u8,
}

pub struct UpgradePipeline<'a> {
    settings: &'a RunSettings,
    feed: &'a dyn ReleaseFeed,
    installer: &'a dyn SdkInstaller,
    steps: Vec<Box<dyn UpgradeStep>>,
}

impl<'a> UpgradePipeline<'a> {
    pub fn new(
        settings: &'a RunSettings,
        feed: &'a dyn ReleaseFeed,
        installer: &'a dyn SdkInstaller,
    ) -> Self {
        Self::with_steps(settings, feed, installer, builtin_steps())
    }

    /// Same pipeline, custom step set. This is the seam tests use.
    pub fn with_steps(
        settings: &'a RunSettings,
        feed: &'a dyn ReleaseFeed,
        installer: &'a dyn SdkInstaller,
        steps: Vec<Box<dyn UpgradeStep>>,
    ) -> Self {
        Self {
            settings,
            feed,
            installer,
            steps,
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<RunOutcome> {
        let mut report = UpgradeReport::new(RunInfo {
            run_id: uuid::Uuid::new_v4(),
            tool: ToolInfo {
                name: "netup".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            started_at: Utc::now(),
            ended_at: None,
        });

        // Resolving.
        let today = Utc::now().date_naive();
        let resolver = ChannelResolver::new(self.feed, self.installer, today);
        let target = match resolver
            .resolve(self.settings.requested, self.settings.explicit_channel, cancel)
            .await
        {
            Ok(target) => target,
            Err(ResolveError::Cancelled) => anyhow::bail!("run cancelled during resolution"),
        };

        let Some(target) = target else {
            // Nothing to do is not an error.
            info!("no eligible upgrade; leaving the tree untouched");
            report.run.ended_at = Some(Utc::now());
            return Ok(RunOutcome {
                report,
                patch: String::new(),
                exit_code: 0,
            });
        };

        if let Some(warning) = support_window_warning(&target, today) {
            warn!("{warning}");
            report.warnings.push(warning);
        }
        report.target = Some(target.clone());

        // Running.
        let projects = discover_projects(&self.settings.repo_root)
            .context("discover projects under the repo root")?;
        let ctx = StepContext {
            repo_root: self.settings.repo_root.clone(),
            target,
            projects,
            rids: PortabilityGraph::builtin(),
            cache: RunCache::default(),
            settings: StepSettings {
                verify_command: self.settings.verify_command.clone(),
            },
            cancel: cancel.clone(),
        };

        let mut aggregate = Severity::None;
        let mut changed_files: Vec<ChangedFile> = Vec::new();

        self.execute_phase(
            StepKind::Upgrader,
            &ctx,
            cancel,
            &mut report,
            &mut aggregate,
            &mut changed_files,
        )
        .await?;

        // Post-processing only when something changed and nothing fatal
        // occurred.
        if aggregate.changed_something() {
            self.execute_phase(
                StepKind::PostProcessor,
                &ctx,
                cancel,
                &mut report,
                &mut aggregate,
                &mut changed_files,
            )
            .await?;
        } else {
            debug!(?aggregate, "skipping post-processors");
        }

        // Reporting.
        report.aggregate = aggregate;
        report.run.ended_at = Some(Utc::now());
        let patch = render_patch(&changed_files);

        let exit_code = match aggregate {
            Severity::Error => 1,
            Severity::Warning if self.settings.fail_on_warnings => 1,
            _ => 0,
        };

        info!(?aggregate, exit_code, "run finished");
        Ok(RunOutcome {
            report,
            patch,
            exit_code,
        })
    }

    async fn execute_phase(
        &self,
        kind: StepKind,
        ctx: &StepContext,
        cancel: &CancellationToken,
        report: &mut UpgradeReport,
        aggregate: &mut Severity,
        changed_files: &mut Vec<ChangedFile>,
    ) -> anyhow::Result<()> {
        let mut phase: Vec<&dyn UpgradeStep> = self
            .steps
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| s.descriptor().kind == kind)
            .collect();
        phase.sort_by_key(|s| s.descriptor().order);

        for step in phase {
            let descriptor = step.descriptor();

            // Cancellation is the one failure that is not isolated.
            if cancel.is_cancelled() {
                anyhow::bail!("run cancelled before step '{}'", descriptor.id);
            }

            debug!(step = %descriptor.id, "running step");
            let outcome = match step.run(ctx).await {
                Ok(step_report) => {
                    let outcome = StepOutcome {
                        id: descriptor.id.clone(),
                        title: descriptor.title.clone(),
                        kind: descriptor.kind,
                        severity: step_report.severity,
                        message: step_report.message,
                        files_changed: step_report
                            .files_changed
                            .iter()
                            .map(|f| f.change.clone())
                            .collect(),
                    };
                    changed_files.extend(step_report.files_changed);
                    outcome
                }
                Err(err) if cancel.is_cancelled() => {
                    return Err(err.context(format!("step '{}' cancelled", descriptor.id)));
                }
                Err(err) => {
                    // Failure isolation: record and keep going.
                    error!(step = %descriptor.id, "step failed: {err:#}");
                    StepOutcome {
                        id: descriptor.id.clone(),
                        title: descriptor.title.clone(),
                        kind: descriptor.kind,
                        severity: Severity::Error,
                        message: Some(format!("{err:#}")),
                        files_changed: vec![],
                    }
                }
            };

            *aggregate = aggregate.join(outcome.severity);
            report.steps.push(outcome);
        }
        Ok(())
    }
}

fn render_patch(changed: &[ChangedFile]) -> String {
    let mut out = String::new();
    let mut formatter = diffy::PatchFormatter::new();

    for file in changed {
        out.push_str(&format!("diff --git a/{0} b/{0}\n", file.change.path));
        out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", file.change.path));
        let patch = diffy::create_patch(&file.before, &file.after);
        out.push_str(&formatter.fmt_patch(&patch).to_string());
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}
