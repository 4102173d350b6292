//! Raises the SDK pin in `global.json`.
//!
//! The version only ever moves forward, `allowPrerelease` is set when the
//! target is a prerelease build, and every unrelated sibling property keeps
//! its bytes. The file is the step's only input, so an unparsable manifest
//! fails the step rather than being skipped.

use crate::{StepContext, StepReport, UpgradeStep, rewrite_file};
use anyhow::Context;
use async_trait::async_trait;
use fs_err as fs;
use netup_edit::TextEdit;
use netup_types::{StepDescriptor, UpgradeTarget};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

pub struct SdkPinStep;

fn sdk_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""sdk"\s*:"#).expect("sdk key regex"))
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""version"\s*:\s*("[^"]*")"#).expect("version regex"))
}

fn allow_prerelease_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""allowPrerelease"\s*:\s*(true|false)"#).expect("allow regex"))
}

/// The `sdk` object's line range: from the key to the line its closing
/// brace lands on.
fn sdk_object_range(lines: &[String]) -> Option<(usize, usize)> {
    let (start, key_match_end) = lines.iter().enumerate().find_map(|(idx, line)| {
        sdk_key_re().find(line).map(|m| (idx, m.end()))
    })?;

    let mut depth = 0i32;
    let mut entered = false;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        let from = if idx == start { key_match_end } else { 0 };
        for b in line[from..].bytes() {
            match b {
                b'{' => {
                    depth += 1;
                    entered = true;
                }
                b'}' => {
                    depth -= 1;
                    if entered && depth == 0 {
                        return Some((start, idx));
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Edits that raise the pin inside the `sdk` object only.
pub fn collect_manifest_edits(lines: &[String], target: &UpgradeTarget) -> Vec<TextEdit> {
    let Some((start, end)) = sdk_object_range(lines) else {
        return Vec::new();
    };
    let region = &lines[start..=end];

    let version_site = region.iter().enumerate().find_map(|(offset, line)| {
        version_re()
            .captures(line)
            .map(|caps| (start + offset, caps.get(1).expect("quoted version")))
    });
    let allow_site = region.iter().enumerate().find_map(|(offset, line)| {
        allow_prerelease_re()
            .captures(line)
            .map(|caps| (start + offset, caps.get(1).expect("bool span")))
    });

    let Some((version_line, version_span)) = version_site else {
        return Vec::new();
    };

    let mut edits = Vec::new();
    match (target.is_prerelease(), &allow_site) {
        (true, None) => {
            // No existing key: graft it right after the version value, on
            // the same line, so no surrounding formatting moves.
            edits.push(TextEdit {
                line: version_line,
                start_col: version_span.start(),
                end_col: version_span.end(),
                replacement: format!("\"{}\", \"allowPrerelease\": true", target.sdk_version),
            });
            return edits;
        }
        (true, Some((allow_line, allow_span))) => {
            if allow_span.as_str() == "false" {
                edits.push(TextEdit {
                    line: *allow_line,
                    start_col: allow_span.start(),
                    end_col: allow_span.end(),
                    replacement: "true".to_string(),
                });
            }
        }
        (false, _) => {}
    }

    edits.push(TextEdit {
        line: version_line,
        start_col: version_span.start(),
        end_col: version_span.end(),
        replacement: format!("\"{}\"", target.sdk_version),
    });
    edits
}

#[async_trait]
impl UpgradeStep for SdkPinStep {
    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::upgrader("manifest.sdk-pin", "SDK version pin", 30)
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<StepReport> {
        let path = ctx.repo_root.join("global.json");
        if !path.exists() {
            return Ok(StepReport::none());
        }

        let text = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
        let manifest: serde_json::Value =
            serde_json::from_str(&text).with_context(|| format!("parse {path}"))?;

        let Some(pinned) = manifest
            .get("sdk")
            .and_then(|sdk| sdk.get("version"))
            .and_then(|v| v.as_str())
        else {
            debug!(%path, "no sdk.version pin present");
            return Ok(StepReport::none());
        };

        let current: semver::Version = pinned
            .parse()
            .with_context(|| format!("sdk.version '{pinned}' in {path} is not a version"))?;
        if current >= ctx.target.sdk_version {
            debug!(%path, %current, "pin already at or past the target; only raising forward");
            return Ok(StepReport::none());
        }

        let change = rewrite_file(ctx, &path, |lines| {
            collect_manifest_edits(lines, &ctx.target)
        })?;
        Ok(StepReport::from_changes(change.into_iter().collect(), vec![]))
    }
}
