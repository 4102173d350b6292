//! The step contract and the built-in steps.
//!
//! A step is a plugin: `{order, kind, run(ctx) -> report}`. The pipeline
//! sorts steps by order, runs every `Upgrader` before any `PostProcessor`,
//! and isolates failures per step. Steps never share mutable state; the one
//! shared structure is the run-scoped [`RunCache`], which is concurrency-safe
//! by construction.

pub mod containers;
pub mod discovery;
pub mod package_versions;
pub mod project_tfm;
pub mod sdk_pin;
pub mod verify;
pub mod workflows;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;
use netup_edit::TextEdit;
use netup_rid::PortabilityGraph;
use netup_types::report::FileChange;
use netup_types::{Severity, StepDescriptor, UpgradeTarget};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

pub use discovery::{ProjectSet, discover_projects};

/// A modified file, with enough content retained to render a diff preview.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub change: FileChange,
    pub before: String,
    pub after: String,
}

/// What one step reports back to the pipeline.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub severity: Severity,
    pub message: Option<String>,
    pub files_changed: Vec<ChangedFile>,
}

impl StepReport {
    /// Nothing to do.
    pub fn none() -> Self {
        Self {
            severity: Severity::None,
            message: None,
            files_changed: vec![],
        }
    }

    /// Changes made; severity derives from whether anything actually
    /// changed and whether files had to be skipped.
    pub fn from_changes(files_changed: Vec<ChangedFile>, skipped: Vec<String>) -> Self {
        let severity = match (files_changed.is_empty(), skipped.is_empty()) {
            (true, true) => Severity::None,
            (_, false) => Severity::Warning,
            (false, true) => Severity::Success,
        };
        let message = if skipped.is_empty() {
            None
        } else {
            Some(format!("skipped unreadable input(s): {}", skipped.join(", ")))
        };
        Self {
            severity,
            message,
            files_changed,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Run-scoped settings a step may consult.
#[derive(Debug, Clone, Default)]
pub struct StepSettings {
    /// Command line for the verification post-processor, e.g.
    /// `dotnet build`. Absent means the verify step is a no-op.
    pub verify_command: Option<String>,
}

/// Process-wide memo cache for the life of one run.
///
/// Keys are external references (e.g. a container image ref); entries are
/// never invalidated mid-run since the inputs cannot change under us.
/// Concurrent access is safe by construction even though the pipeline is
/// sequential.
#[derive(Debug, Default)]
pub struct RunCache {
    entries: DashMap<String, String>,
}

impl RunCache {
    pub fn get_or_insert_with(&self, key: &str, compute: impl FnOnce() -> String) -> String {
        self.entries
            .entry(key.to_string())
            .or_insert_with(compute)
            .clone()
    }
}

/// Everything a step gets to see. The target is resolved once per run and
/// read-only from here on.
pub struct StepContext {
    pub repo_root: Utf8PathBuf,
    pub target: UpgradeTarget,
    pub projects: ProjectSet,
    pub rids: &'static PortabilityGraph,
    pub cache: RunCache,
    pub settings: StepSettings,
    pub cancel: CancellationToken,
}

impl StepContext {
    /// Path rendered relative to the repo root, for reports.
    pub fn display_path(&self, path: &Utf8Path) -> String {
        path.strip_prefix(&self.repo_root)
            .unwrap_or(path)
            .to_string()
    }
}

/// The step plugin contract.
#[async_trait]
pub trait UpgradeStep: Send + Sync {
    fn descriptor(&self) -> StepDescriptor;

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<StepReport>;
}

/// The built-in step set, unsorted; the pipeline orders them.
pub fn builtin_steps() -> Vec<Box<dyn UpgradeStep>> {
    vec![
        Box::new(project_tfm::ProjectTfmStep),
        Box::new(package_versions::PackageVersionsStep),
        Box::new(sdk_pin::SdkPinStep),
        Box::new(workflows::WorkflowScriptsStep),
        Box::new(containers::ContainerImagesStep),
        Box::new(verify::VerifyStep),
    ]
}

/// Apply edits to one file through the snapshot-faithful engine.
///
/// Returns the change record when the file was modified, `None` when the
/// edit list was empty or an identity rewrite.
pub fn rewrite_file<F>(
    ctx: &StepContext,
    path: &Utf8Path,
    collect: F,
) -> Result<Option<ChangedFile>, netup_edit::SnapshotError>
where
    F: FnOnce(&[String]) -> Vec<TextEdit>,
{
    let (mut lines, snapshot) = netup_edit::read_lines(path)?;
    let before = joined(&lines);

    let edits = collect(&lines);
    if !netup_edit::apply_edits(&mut lines, &edits) {
        return Ok(None);
    }

    netup_edit::write_lines(path, &lines, snapshot)?;
    let after = joined(&lines);
    Ok(Some(ChangedFile {
        change: FileChange {
            path: ctx.display_path(path),
            sha256_before: sha256_hex(&before),
            sha256_after: sha256_hex(&after),
        },
        before,
        after,
    }))
}

fn joined(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use camino::Utf8PathBuf;
    use netup_types::{Channel, ReleaseKind, SupportPhase};
    use tempfile::TempDir;

    pub fn target(channel: Channel, sdk: &str) -> UpgradeTarget {
        UpgradeTarget {
            channel,
            sdk_version: sdk.parse().expect("sdk version"),
            release_kind: ReleaseKind::Lts,
            support_phase: SupportPhase::Active,
            eol_date: None,
        }
    }

    /// A context rooted in a temp directory seeded with `files`.
    pub fn context(files: &[(&str, &str)], target: UpgradeTarget) -> (TempDir, StepContext) {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 root");
        for (rel, contents) in files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create parent");
            }
            std::fs::write(&path, contents).expect("write fixture");
        }

        let projects = discover_projects(&root).expect("discover");
        let ctx = StepContext {
            repo_root: root,
            target,
            projects,
            rids: PortabilityGraph::builtin(),
            cache: RunCache::default(),
            settings: StepSettings::default(),
            cancel: CancellationToken::new(),
        };
        (dir, ctx)
    }

    pub fn read(ctx: &StepContext, rel: &str) -> String {
        std::fs::read_to_string(ctx.repo_root.join(rel)).expect("read back")
    }
}
