//! Rendering helpers (markdown) for human-readable run artifacts.

use netup_types::report::UpgradeReport;
use netup_types::{Severity, StepKind};

pub fn render_report_md(report: &UpgradeReport) -> String {
    let mut out = String::new();
    out.push_str("# netup run\n\n");

    match &report.target {
        Some(target) => {
            out.push_str(&format!(
                "- Target channel: `{}` (SDK `{}`)\n",
                target.channel, target.sdk_version
            ));
            if let Some(eol) = target.eol_date {
                out.push_str(&format!("- End of support: {eol}\n"));
            }
        }
        None => out.push_str("- No eligible upgrade target.\n"),
    }
    out.push_str(&format!(
        "- Outcome: `{}`\n",
        severity_label(report.aggregate)
    ));
    out.push_str(&format!("- Started: {}\n", report.run.started_at));
    if let Some(ended) = report.run.ended_at {
        out.push_str(&format!("- Ended: {ended}\n"));
    }
    out.push('\n');

    for warning in &report.warnings {
        out.push_str(&format!("> ⚠ {warning}\n\n"));
    }

    out.push_str("## Steps\n\n");
    if report.steps.is_empty() {
        out.push_str("_No steps ran._\n");
        return out;
    }

    for (i, step) in report.steps.iter().enumerate() {
        out.push_str(&format!("### {}. {}\n\n", i + 1, step.title));
        out.push_str(&format!("- Id: `{}`\n", step.id));
        out.push_str(&format!("- Phase: `{}`\n", kind_label(step.kind)));
        out.push_str(&format!("- Outcome: `{}`\n", severity_label(step.severity)));
        if let Some(message) = &step.message {
            out.push_str(&format!("- Note: {message}\n"));
        }

        if !step.files_changed.is_empty() {
            out.push_str("\n**Files changed**\n\n");
            for change in &step.files_changed {
                out.push_str(&format!(
                    "- `{}` {} → {}\n",
                    change.path,
                    short(&change.sha256_before),
                    short(&change.sha256_after)
                ));
            }
        }
        out.push('\n');
    }

    out
}

/// Compact table for a CI step summary ($GITHUB_STEP_SUMMARY).
pub fn render_step_summary_md(report: &UpgradeReport) -> String {
    let mut out = String::new();

    match &report.target {
        Some(target) => out.push_str(&format!(
            "### netup: upgrade toward `{}`\n\n",
            target.channel
        )),
        None => {
            out.push_str("### netup: no eligible upgrade\n");
            return out;
        }
    }

    out.push_str("| Step | Phase | Outcome |\n|---|---|---|\n");
    for step in &report.steps {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            step.title,
            kind_label(step.kind),
            severity_label(step.severity)
        ));
    }
    out.push_str(&format!(
        "\n**Overall:** {}\n",
        severity_label(report.aggregate)
    ));

    for warning in &report.warnings {
        out.push_str(&format!("\n> ⚠ {warning}\n"));
    }

    out
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::None => "no changes",
        Severity::Success => "success",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

fn kind_label(kind: StepKind) -> &'static str {
    match kind {
        StepKind::Upgrader => "upgrade",
        StepKind::PostProcessor => "post-process",
    }
}

fn short(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}
