use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

fn base_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_scangate"));
    cmd.env("HOME", home);
    cmd.env_remove("SCANGATE_CONFIG");
    cmd.env_remove("SCANGATE_ENV_ROOT");
    cmd.env_remove("SCANGATE_PROTECODE_SERVER_URL");
    cmd.env_remove("SCANGATE_PROTECODE_GROUP");
    cmd.env_remove("SCANGATE_PROTECODE_CLEANUP_MODE");
    cmd.env_remove("SCANGATE_PROTECODE_TIMEOUT_MINUTES");
    cmd.env_remove("SCANGATE_PROTECODE_EXCLUDE_CVES");
    cmd.env_remove("SCANGATE_CHECKMARX_THRESHOLD_UNIT");
    cmd.env_remove("SCANGATE_CHECKMARX_THRESHOLD_HIGH");
    cmd
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("scangate-env-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

#[test]
fn env_overrides_config_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/scangate/config.toml").as_path(),
        br#"
[protecode]
cleanup_mode = "none"
timeout_minutes = 30

[checkmarx]
threshold_unit = "absolute"
"#,
    );

    let out = {
        let mut cmd = base_cmd(&home);
        cmd.env("SCANGATE_PROTECODE_CLEANUP_MODE", "complete");
        cmd.env("SCANGATE_CHECKMARX_THRESHOLD_UNIT", "percentage");
        cmd.args(["config", "--show"]);
        cmd.output().expect("run scangate")
    };
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        v.pointer("/protecode/cleanup_mode").and_then(|c| c.as_str()),
        Some("complete")
    );
    assert_eq!(
        v.pointer("/protecode/timeout_minutes").and_then(|c| c.as_u64()),
        Some(30)
    );
    assert_eq!(
        v.pointer("/checkmarx/threshold_unit").and_then(|c| c.as_str()),
        Some("percentage")
    );

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn env_exclude_cves_are_comma_separated() {
    let home = make_temp_home();

    let out = {
        let mut cmd = base_cmd(&home);
        cmd.env(
            "SCANGATE_PROTECODE_EXCLUDE_CVES",
            "CVE-2024-0001, CVE-2024-0002 ,,",
        );
        cmd.args(["config", "--show"]);
        cmd.output().expect("run scangate")
    };
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    let cves: Vec<&str> = v
        .pointer("/protecode/exclude_cves")
        .and_then(|c| c.as_array())
        .expect("exclude_cves array")
        .iter()
        .filter_map(|c| c.as_str())
        .collect();
    assert_eq!(cves, vec!["CVE-2024-0001", "CVE-2024-0002"]);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_value_exits_2() {
    let home = make_temp_home();

    let out = {
        let mut cmd = base_cmd(&home);
        cmd.env("SCANGATE_PROTECODE_TIMEOUT_MINUTES", "soon");
        cmd.args(["config", "--show"]);
        cmd.output().expect("run scangate")
    };
    assert_eq!(out.status.code(), Some(2));

    let _ = std::fs::remove_dir_all(&home);
}
