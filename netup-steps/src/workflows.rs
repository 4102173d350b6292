//! Rewrites embedded CI scripts and standalone shell scripts.

use crate::{StepContext, StepReport, UpgradeStep, rewrite_file};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use netup_edit::TextEdit;
use netup_script::{collect_edits, locate_workflow_scripts, parse, parse_lenient};
use netup_types::StepDescriptor;
use tracing::warn;
use walkdir::WalkDir;

pub struct WorkflowScriptsStep;

fn workflow_files(repo_root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let dir = repo_root.join(".github").join("workflows");
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut files: Vec<Utf8PathBuf> = entries
        .flatten()
        .filter_map(|e| Utf8PathBuf::from_path_buf(e.path()).ok())
        .filter(|p| matches!(p.extension(), Some("yml") | Some("yaml")))
        .collect();
    files.sort();
    files
}

fn shell_scripts(repo_root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut files: Vec<Utf8PathBuf> = WalkDir::new(repo_root)
        .into_iter()
        .filter_entry(|e| !crate::discovery::is_skipped_dir(e))
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| Utf8PathBuf::from_path_buf(e.path().to_path_buf()).ok())
        .filter(|p| p.extension() == Some("sh"))
        .collect();
    files.sort();
    files
}

/// Edits for a workflow host document: locate fragments, parse each
/// leniently (CI fragments are routinely templated), translate edit
/// coordinates back into the host.
fn workflow_edits(ctx: &StepContext, lines: &[String]) -> Vec<TextEdit> {
    let host = lines.join("\n") + "\n";
    let mut edits = Vec::new();
    for doc in locate_workflow_scripts(&host) {
        let tree = parse_lenient(&doc.text);
        for edit in collect_edits(&tree, ctx.target.channel, ctx.rids) {
            edits.push(doc.to_host_edit(&edit));
        }
    }
    edits
}

/// Edits for a whole-file script; a parse failure is fatal to this file
/// only and produces no edits.
fn script_edits(ctx: &StepContext, path: &Utf8Path, lines: &[String]) -> Vec<TextEdit> {
    let text = lines.join("\n") + "\n";
    match parse(&text) {
        Ok(tree) => collect_edits(&tree, ctx.target.channel, ctx.rids),
        Err(err) => {
            warn!(%path, "script not rewritten: {err}");
            Vec::new()
        }
    }
}

#[async_trait]
impl UpgradeStep for WorkflowScriptsStep {
    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::upgrader("ci.scripts", "CI and shell scripts", 40)
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<StepReport> {
        let mut changed = Vec::new();
        let mut skipped = Vec::new();

        for path in workflow_files(&ctx.repo_root) {
            match rewrite_file(ctx, &path, |lines| workflow_edits(ctx, lines)) {
                Ok(Some(change)) => changed.push(change),
                Ok(None) => {}
                Err(err) => {
                    warn!(%path, "skipping workflow: {err}");
                    skipped.push(ctx.display_path(&path));
                }
            }
        }

        for path in shell_scripts(&ctx.repo_root) {
            match rewrite_file(ctx, &path, |lines| script_edits(ctx, &path, lines)) {
                Ok(Some(change)) => changed.push(change),
                Ok(None) => {}
                Err(err) => {
                    warn!(%path, "skipping script: {err}");
                    skipped.push(ctx.display_path(&path));
                }
            }
        }

        Ok(StepReport::from_changes(changed, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, read, target};
    use netup_types::{Channel, Severity};
    use pretty_assertions::assert_eq;

    const WORKFLOW: &str = "\
name: ci
jobs:
  build:
    steps:
      - name: Build
        run: dotnet build -f net6.0
      - name: Publish
        shell: pwsh
        run: dotnet publish -f net6.0
";

    #[tokio::test]
    async fn workflow_scripts_are_rewritten_and_foreign_shells_skipped() {
        let (_dir, ctx) = context(
            &[(".github/workflows/ci.yml", WORKFLOW)],
            target(Channel::new(8, 0), "8.0.204"),
        );
        let report = WorkflowScriptsStep.run(&ctx).await.expect("run");

        assert_eq!(report.severity, Severity::Success);
        let after = read(&ctx, ".github/workflows/ci.yml");
        assert!(after.contains("run: dotnet build -f net8.0"));
        assert!(after.contains("run: dotnet publish -f net6.0"));
    }

    #[tokio::test]
    async fn standalone_scripts_are_rewritten_strictly() {
        let (_dir, ctx) = context(
            &[(
                "build.sh",
                "#!/bin/sh\ndotnet publish -r ubuntu.22.04-x64 -f net6.0\n",
            )],
            target(Channel::new(8, 0), "8.0.204"),
        );
        let report = WorkflowScriptsStep.run(&ctx).await.expect("run");

        assert_eq!(report.severity, Severity::Success);
        let after = read(&ctx, "build.sh");
        assert_eq!(
            after,
            "#!/bin/sh\ndotnet publish -r linux-x64 -f net8.0\n"
        );
    }

    #[tokio::test]
    async fn broken_script_is_skipped_without_failing_the_step() {
        let (_dir, ctx) = context(
            &[
                ("broken.sh", "echo 'unterminated\ndotnet build -f net6.0\n"),
                ("fine.sh", "dotnet build -f net6.0\n"),
            ],
            target(Channel::new(8, 0), "8.0.204"),
        );
        let report = WorkflowScriptsStep.run(&ctx).await.expect("run");

        assert_eq!(report.severity, Severity::Success);
        assert_eq!(read(&ctx, "broken.sh"), "echo 'unterminated\ndotnet build -f net6.0\n");
        assert_eq!(read(&ctx, "fine.sh"), "dotnet build -f net8.0\n");
    }

    #[tokio::test]
    async fn nothing_to_do_reports_none() {
        let (_dir, ctx) = context(
            &[(".github/workflows/ci.yml", "name: ci\njobs: {}\n")],
            target(Channel::new(8, 0), "8.0.204"),
        );
        let report = WorkflowScriptsStep.run(&ctx).await.expect("run");
        assert_eq!(report.severity, Severity::None);
    }
}
