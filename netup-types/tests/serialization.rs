use chrono::{TimeZone, Utc};
use netup_types::report::{FileChange, RunInfo, StepOutcome, ToolInfo, UpgradeReport};
use netup_types::{Channel, ReleaseKind, Severity, StepKind, SupportPhase, UpgradeTarget};

fn sample_target() -> UpgradeTarget {
    UpgradeTarget {
        channel: Channel::new(8, 0),
        sdk_version: "8.0.204".parse().expect("sdk version"),
        release_kind: ReleaseKind::Lts,
        support_phase: SupportPhase::Active,
        eol_date: Some("2026-11-10".parse().expect("date")),
    }
}

fn sample_report() -> UpgradeReport {
    let mut report = UpgradeReport::new(RunInfo {
        run_id: uuid::Uuid::nil(),
        tool: ToolInfo {
            name: "netup".to_string(),
            version: "0.1.0".to_string(),
        },
        started_at: Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap(),
        ended_at: Some(Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 30).unwrap()),
    });
    report.target = Some(sample_target());
    report.steps.push(StepOutcome {
        id: "project.tfm".to_string(),
        title: "Target framework".to_string(),
        kind: StepKind::Upgrader,
        severity: Severity::Success,
        message: None,
        files_changed: vec![FileChange {
            path: "app/app.csproj".to_string(),
            sha256_before: "aa".to_string(),
            sha256_after: "bb".to_string(),
        }],
    });
    report.aggregate = Severity::Success;
    report
}

#[test]
fn report_round_trips_through_json() {
    let report = sample_report();
    let json = serde_json::to_string_pretty(&report).expect("serialize");
    let back: UpgradeReport = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(back.schema, "netup.report.v1");
    assert_eq!(back.steps.len(), 1);
    assert_eq!(back.aggregate, Severity::Success);
    assert_eq!(back.target.expect("target").channel, Channel::new(8, 0));
}

#[test]
fn report_without_target_omits_the_field() {
    let report = UpgradeReport::new(sample_report().run);
    let value = serde_json::to_value(&report).expect("serialize");
    assert!(value.get("target").is_none());
    assert!(value.get("warnings").is_none());
    assert_eq!(value["aggregate"], serde_json::json!("none"));
}

#[test]
fn step_kind_serializes_snake_case() {
    assert_eq!(
        serde_json::to_value(StepKind::PostProcessor).expect("serialize"),
        serde_json::json!("post_processor")
    );
    assert_eq!(
        serde_json::to_value(StepKind::Upgrader).expect("serialize"),
        serde_json::json!("upgrader")
    );
}

#[test]
fn target_serializes_channel_and_eol_as_strings() {
    let value = serde_json::to_value(sample_target()).expect("serialize");
    assert_eq!(value["channel"], serde_json::json!("8.0"));
    assert_eq!(value["sdk_version"], serde_json::json!("8.0.204"));
    assert_eq!(value["eol_date"], serde_json::json!("2026-11-10"));
    assert_eq!(value["release_kind"], serde_json::json!("lts"));
    assert_eq!(value["support_phase"], serde_json::json!("active"));
}
