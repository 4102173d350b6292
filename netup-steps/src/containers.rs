//! Bumps channel-versioned tags of platform base images in Dockerfiles.

use crate::{StepContext, StepReport, UpgradeStep, rewrite_file};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use netup_edit::TextEdit;
use netup_types::{Channel, StepDescriptor};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;
use walkdir::WalkDir;

pub struct ContainerImagesStep;

/// Image repositories whose tags track the platform channel.
const PLATFORM_IMAGE_MARKERS: &[&str] = &["dotnet/sdk", "dotnet/aspnet", "dotnet/runtime"];

fn from_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // FROM [--platform=...] repo[:tag] [AS name]
    RE.get_or_init(|| {
        Regex::new(r"^\s*FROM\s+(?:--platform=\S+\s+)?(\S+)").expect("from regex")
    })
}

fn tag_channel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)").expect("tag regex"))
}

fn dockerfiles(repo_root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut files: Vec<Utf8PathBuf> = WalkDir::new(repo_root)
        .into_iter()
        .filter_entry(|e| !crate::discovery::is_skipped_dir(e))
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| Utf8PathBuf::from_path_buf(e.path().to_path_buf()).ok())
        .filter(|p| {
            p.file_name()
                .is_some_and(|name| name == "Dockerfile" || name.starts_with("Dockerfile."))
                || p.extension() == Some("dockerfile")
        })
        .collect();
    files.sort();
    files
}

/// The upgraded spelling of an image reference, or `None` when it is not a
/// channel-tagged platform image below the target.
fn upgraded_reference(image: &str, target: Channel) -> Option<String> {
    // Never rewrite digest-pinned references.
    if image.contains('@') {
        return None;
    }
    let (repo, tag) = image.rsplit_once(':')?;
    if !PLATFORM_IMAGE_MARKERS.iter().any(|m| repo.contains(m)) {
        return None;
    }

    let caps = tag_channel_re().captures(tag)?;
    let current = Channel::new(caps[1].parse().ok()?, caps[2].parse().ok()?);
    if current >= target {
        return None;
    }
    // Keep any variant suffix (`6.0-alpine` -> `8.0-alpine`).
    let suffix = &tag[caps.get(0).expect("whole match").end()..];
    Some(format!("{repo}:{target}{suffix}"))
}

pub fn collect_container_edits(ctx: &StepContext, lines: &[String]) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        let Some(caps) = from_line_re().captures(line) else {
            continue;
        };
        let image = caps.get(1).expect("image group");

        // Resolution is memoized per image reference for the life of the
        // run; a repeated base image across Dockerfiles computes once.
        let resolved = ctx.cache.get_or_insert_with(image.as_str(), || {
            upgraded_reference(image.as_str(), ctx.target.channel)
                .unwrap_or_else(|| image.as_str().to_string())
        });

        if resolved != image.as_str() {
            edits.push(TextEdit {
                line: line_idx,
                start_col: image.start(),
                end_col: image.end(),
                replacement: resolved,
            });
        }
    }
    edits
}

#[async_trait]
impl UpgradeStep for ContainerImagesStep {
    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::upgrader("containers.base-images", "Container base images", 50)
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<StepReport> {
        let mut changed = Vec::new();
        let mut skipped = Vec::new();

        for path in dockerfiles(&ctx.repo_root) {
            match rewrite_file(ctx, &path, |lines| collect_container_edits(ctx, lines)) {
                Ok(Some(change)) => changed.push(change),
                Ok(None) => {}
                Err(err) => {
                    warn!(%path, "skipping container file: {err}");
                    skipped.push(ctx.display_path(&path));
                }
            }
        }

        Ok(StepReport::from_changes(changed, skipped))
    }
}
