//! Rewrites `<TargetFramework>`/`<TargetFrameworks>` values in project files.

use crate::{StepContext, StepReport, UpgradeStep, rewrite_file};
use async_trait::async_trait;
use netup_edit::TextEdit;
use netup_types::{Channel, StepDescriptor};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub struct ProjectTfmStep;

fn tfm_element_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<(TargetFramework|TargetFrameworks)>([^<]*)</(TargetFramework|TargetFrameworks)>")
            .expect("tfm regex")
    })
}

/// Collect edits for every target-framework element value in `lines`.
pub fn collect_tfm_edits(lines: &[String], target: Channel) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        for caps in tfm_element_re().captures_iter(line) {
            let value = caps.get(2).expect("value group");
            match netup_tfm::try_upgrade(value.as_str(), target) {
                Ok(upgraded) if upgraded.changed => {
                    edits.push(TextEdit {
                        line: line_idx,
                        start_col: value.start(),
                        end_col: value.end(),
                        replacement: upgraded.value,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(line = line_idx + 1, "leaving framework list alone: {err}");
                }
            }
        }
    }
    edits
}

#[async_trait]
impl UpgradeStep for ProjectTfmStep {
    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::upgrader("project.tfm", "Target frameworks", 10)
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<StepReport> {
        let mut changed = Vec::new();
        let mut skipped = Vec::new();

        for project in &ctx.projects.projects {
            match rewrite_file(ctx, project, |lines| {
                collect_tfm_edits(lines, ctx.target.channel)
            }) {
                Ok(Some(change)) => changed.push(change),
                Ok(None) => {}
                Err(err) => {
                    warn!(%project, "skipping project file: {err}");
                    skipped.push(ctx.display_path(project));
                }
            }
        }

        Ok(StepReport::from_changes(changed, skipped))
    }
}
