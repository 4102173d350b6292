mod config;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fs_err as fs;
use netup_core::{CommandSdkInstaller, RunOutcome, RunSettings, UpgradePipeline};
use netup_releases::{ChannelResolver, HttpReleaseFeed, RequestedKind, support_window_warning};
use netup_render::{render_report_md, render_step_summary_md};
use netup_types::Channel;
use std::io::Write;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "netup",
    version,
    about = "Upgrades a .NET project tree to the next release channel."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a target channel and rewrite the project tree toward it.
    Upgrade(UpgradeArgs),
    /// Resolve and print the upgrade target without touching any files.
    Resolve(ResolveArgs),
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum KindArg {
    Latest,
    Lts,
    Preview,
    Daily,
}

impl From<KindArg> for RequestedKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Latest => RequestedKind::Latest,
            KindArg::Lts => RequestedKind::Lts,
            KindArg::Preview => RequestedKind::Preview,
            KindArg::Daily => RequestedKind::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ReportFormat {
    None,
    Json,
    Markdown,
    Github,
}

#[derive(Debug, Parser)]
struct UpgradeArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Which release kind to upgrade toward.
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Explicit target channel (e.g. 9.0); eligibility becomes exact match.
    #[arg(long)]
    channel: Option<Channel>,

    /// Treat a warning outcome as a failing exit code.
    #[arg(long, default_value_t = false)]
    fail_on_warnings: bool,

    /// Command to build/test the tree after a successful upgrade.
    #[arg(long)]
    verify_command: Option<String>,

    /// Structured result output.
    #[arg(long, value_enum, default_value = "none")]
    report: ReportFormat,

    /// Directory for run artifacts (default: <repo_root>/.netup).
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// Release-index URL, or a path to a local mirror of it.
    #[arg(long)]
    index_url: Option<String>,

    /// Base URL of the daily-build version endpoint.
    #[arg(long)]
    daily_base_url: Option<String>,
}

#[derive(Debug, Parser)]
struct ResolveArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    #[arg(long)]
    channel: Option<Channel>,

    #[arg(long)]
    index_url: Option<String>,

    #[arg(long)]
    daily_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Upgrade(args) => cmd_upgrade(args).await,
        Command::Resolve(args) => cmd_resolve(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn parse_kind(value: &str) -> anyhow::Result<RequestedKind> {
    match value {
        "latest" => Ok(RequestedKind::Latest),
        "lts" => Ok(RequestedKind::Lts),
        "preview" => Ok(RequestedKind::Preview),
        "daily" => Ok(RequestedKind::Daily),
        other => anyhow::bail!("unknown upgrade kind '{other}' in netup.toml"),
    }
}

fn build_settings(args: &UpgradeArgs) -> anyhow::Result<RunSettings> {
    let file = config::load_or_default(&args.repo_root).context("load netup.toml")?;
    let defaults = RunSettings::default();

    let requested = match (args.kind, file.upgrade.kind.as_deref()) {
        (Some(kind), _) => kind.into(),
        (None, Some(kind)) => parse_kind(kind)?,
        (None, None) => RequestedKind::Latest,
    };
    let explicit_channel = match (&args.channel, &file.upgrade.channel) {
        (Some(channel), _) => Some(*channel),
        (None, Some(raw)) => Some(raw.parse().context("parse upgrade.channel in netup.toml")?),
        (None, None) => None,
    };

    Ok(RunSettings {
        repo_root: args.repo_root.clone(),
        requested,
        explicit_channel,
        fail_on_warnings: args.fail_on_warnings || file.upgrade.fail_on_warnings,
        verify_command: args
            .verify_command
            .clone()
            .or(file.upgrade.verify_command),
        sdk_install_command: file.upgrade.sdk_install_command,
        index_url: args
            .index_url
            .clone()
            .or(file.feed.index_url)
            .unwrap_or(defaults.index_url),
        daily_build_base_url: args
            .daily_base_url
            .clone()
            .or(file.feed.daily_base_url)
            .unwrap_or(defaults.daily_build_base_url),
    })
}

/// Cancellation token wired to Ctrl-C.
fn cancellation_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signalled = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling the run");
            signalled.cancel();
        }
    });
    token
}

async fn cmd_upgrade(args: UpgradeArgs) -> anyhow::Result<u8> {
    let settings = build_settings(&args)?;
    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| settings.repo_root.join(".netup"));

    let feed = HttpReleaseFeed::new(&settings.index_url, &settings.daily_build_base_url);
    let installer = CommandSdkInstaller::new(
        settings.sdk_install_command.clone(),
        settings.repo_root.clone(),
    );
    let pipeline = UpgradePipeline::new(&settings, &feed, &installer);

    let cancel = cancellation_token();
    let outcome = pipeline.run(&cancel).await?;

    write_artifacts(&out_dir, &outcome)?;
    emit_report(args.report, &outcome)?;

    Ok(outcome.exit_code)
}

fn write_artifacts(out_dir: &Utf8Path, outcome: &RunOutcome) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {out_dir}"))?;

    let json =
        serde_json::to_string_pretty(&outcome.report).context("serialize report")?;
    fs::write(out_dir.join("report.json"), json)?;
    fs::write(out_dir.join("report.md"), render_report_md(&outcome.report))?;
    fs::write(out_dir.join("patch.diff"), &outcome.patch)?;

    info!("wrote run artifacts to {out_dir}");
    Ok(())
}

fn emit_report(format: ReportFormat, outcome: &RunOutcome) -> anyhow::Result<()> {
    match format {
        ReportFormat::None => {}
        ReportFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome.report).context("serialize report")?
            );
        }
        ReportFormat::Markdown => {
            println!("{}", render_report_md(&outcome.report));
        }
        ReportFormat::Github => {
            let summary = render_step_summary_md(&outcome.report);
            match std::env::var_os("GITHUB_STEP_SUMMARY") {
                Some(path) => {
                    let mut file = fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .context("open GITHUB_STEP_SUMMARY")?;
                    file.write_all(summary.as_bytes())
                        .context("append step summary")?;
                }
                None => {
                    warn!("GITHUB_STEP_SUMMARY is not set; printing the summary instead");
                    println!("{summary}");
                }
            }
        }
    }
    Ok(())
}

async fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<u8> {
    let upgrade_args = UpgradeArgs {
        repo_root: args.repo_root,
        kind: args.kind,
        channel: args.channel,
        fail_on_warnings: false,
        verify_command: None,
        report: ReportFormat::None,
        out_dir: None,
        index_url: args.index_url,
        daily_base_url: args.daily_base_url,
    };
    let settings = build_settings(&upgrade_args)?;

    let feed = HttpReleaseFeed::new(&settings.index_url, &settings.daily_build_base_url);
    let installer = CommandSdkInstaller::new(
        settings.sdk_install_command.clone(),
        settings.repo_root.clone(),
    );
    let today = Utc::now().date_naive();
    let resolver = ChannelResolver::new(&feed, &installer, today);

    let cancel = cancellation_token();
    let target = resolver
        .resolve(settings.requested, settings.explicit_channel, &cancel)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;

    match target {
        Some(target) => {
            if let Some(warning) = support_window_warning(&target, today) {
                warn!("{warning}");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&target).context("serialize target")?
            );
        }
        None => println!("no eligible upgrade"),
    }
    Ok(0)
}
