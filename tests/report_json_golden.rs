use scangate::core::{ScanReport, VulnCounts};

#[test]
fn report_json_matches_golden() {
    let report = ScanReport {
        schema_version: "1.0".to_string(),
        tool_version: "0.1.0".to_string(),
        backend: "protecode".to_string(),
        target: ".scangate/cache/team_app:1.0.tar".to_string(),
        product_id: Some(4711),
        status: "R".to_string(),
        report_file: Some("protecode_report.pdf".to_string()),
        vuln_counts: Some(VulnCounts {
            count: 2,
            cvss2_ge_seven: 1,
            cvss3_ge_seven: 0,
            historical: 3,
            triaged: 1,
            excluded: 0,
            minor: 1,
            major: 1,
            vulnerabilities: 2,
        }),
        severity_counts: None,
        notes: vec![
            "レポート: protecode_report.pdf".to_string(),
            "対象: .scangate/cache/team_app:1.0.tar".to_string(),
        ],
        generated_at: "2026-01-01T00:00:00Z".to_string(),
    };

    let actual = serde_json::to_value(&report).expect("serialize report");
    let expected: serde_json::Value =
        serde_json::from_str(include_str!("golden/report.json")).expect("parse golden json");

    assert_eq!(actual, expected);
}
