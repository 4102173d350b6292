//! Bumps channel-versioned platform package references.
//!
//! Runs after the framework rewrite: a `PackageReference` whose version
//! trails the *new* channel is what needs raising. Only platform-owned
//! package families are touched; third-party versions are none of our
//! business.

use crate::{StepContext, StepReport, UpgradeStep, rewrite_file};
use async_trait::async_trait;
use netup_edit::TextEdit;
use netup_types::{Channel, StepDescriptor};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

pub struct PackageVersionsStep;

/// Package id prefixes whose versions track the platform channel.
const PLATFORM_PACKAGE_PREFIXES: &[&str] = &[
    "Microsoft.AspNetCore.",
    "Microsoft.EntityFrameworkCore",
    "Microsoft.Extensions.",
];

fn package_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<PackageReference\s+Include="([^"]+)"\s+Version="(\d+)\.(\d+)(\.[^"]*)?""#)
            .expect("package reference regex")
    })
}

pub fn collect_package_edits(lines: &[String], target: Channel) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        for caps in package_reference_re().captures_iter(line) {
            let package = &caps[1];
            if !PLATFORM_PACKAGE_PREFIXES
                .iter()
                .any(|p| package.starts_with(p))
            {
                continue;
            }

            let (Ok(major), Ok(minor)) = (caps[2].parse::<u16>(), caps[3].parse::<u16>()) else {
                continue;
            };
            let current = Channel::new(major, minor);
            if current >= target {
                continue;
            }

            // Replace only the major.minor prefix; `.0` as the patch keeps
            // the reference restorable.
            let major_span = caps.get(2).expect("major group");
            let minor_span = caps.get(3).expect("minor group");
            let patch = caps.get(4).map(|m| m.as_str()).unwrap_or("");
            let replacement = if patch.is_empty() {
                target.to_string()
            } else {
                format!("{target}.0")
            };
            edits.push(TextEdit {
                line: line_idx,
                start_col: major_span.start(),
                end_col: minor_span.end() + patch.len(),
                replacement,
            });
        }
    }
    edits
}

#[async_trait]
impl UpgradeStep for PackageVersionsStep {
    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::upgrader("project.package-versions", "Platform package versions", 20)
    }

    async fn run(&self, ctx: &StepContext) -> anyhow::Result<StepReport> {
        let mut changed = Vec::new();
        let mut skipped = Vec::new();

        for project in &ctx.projects.projects {
            match rewrite_file(ctx, project, |lines| {
                collect_package_edits(lines, ctx.target.channel)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, read, target};
    use netup_types::Severity;
    use pretty_assertions::assert_eq;

    const PROJECT: &str = "\
<Project Sdk=\"Microsoft.NET.Sdk.Web\">
  <ItemGroup>
    <PackageReference Include=\"Microsoft.AspNetCore.OpenApi\" Version=\"6.0.36\" />
    <PackageReference Include=\"Microsoft.EntityFrameworkCore\" Version=\"6.0.36\" />
    <PackageReference Include=\"Newtonsoft.Json\" Version=\"13.0.3\" />
  </ItemGroup>
</Project>
";

    #[tokio::test]
    async fn platform_packages_are_bumped_and_third_party_left_alone() {
        let (_dir, ctx) = context(
            &[("app/App.csproj", PROJECT)],
            target(Channel::new(8, 0), "8.0.204"),
        );
        let report = PackageVersionsStep.run(&ctx).await.expect("run");

        assert_eq!(report.severity, Severity::Success);
        let after = read(&ctx, "app/App.csproj");
        assert!(after.contains("Include=\"Microsoft.AspNetCore.OpenApi\" Version=\"8.0.0\""));
        assert!(after.contains("Include=\"Microsoft.EntityFrameworkCore\" Version=\"8.0.0\""));
        assert!(after.contains("Include=\"Newtonsoft.Json\" Version=\"13.0.3\""));
    }

    #[tokio::test]
    async fn versions_at_or_past_the_target_are_untouched() {
        let project = PROJECT.replace("6.0.36", "8.0.1");
        let (_dir, ctx) = context(
            &[("app/App.csproj", project.as_str())],
            target(Channel::new(8, 0), "8.0.204"),
        );
        let report = PackageVersionsStep.run(&ctx).await.expect("run");

        assert_eq!(report.severity, Severity::None);
        assert_eq!(read(&ctx, "app/App.csproj"), project);
    }
}
