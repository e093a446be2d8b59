use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn scangate_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_scangate"));
    cmd.env("HOME", home);
    cmd.env_remove("SCANGATE_CONFIG");
    cmd.env_remove("SCANGATE_ENV_ROOT");
    cmd.env_remove("SCANGATE_PROTECODE_SERVER_URL");
    cmd.env_remove("SCANGATE_PROTECODE_GROUP");
    cmd.env_remove("SCANGATE_PROTECODE_USER");
    cmd.env_remove("SCANGATE_PROTECODE_PASSWORD");
    cmd.env_remove("SCANGATE_PROTECODE_CLEANUP_MODE");
    cmd.env_remove("SCANGATE_CHECKMARX_SERVER_URL");
    cmd.env_remove("SCANGATE_CHECKMARX_USERNAME");
    cmd.env_remove("SCANGATE_CHECKMARX_PASSWORD");
    cmd.env_remove("SCANGATE_CHECKMARX_TEAM_NAME");
    cmd.env_remove("SCANGATE_CHECKMARX_PROJECT_NAME");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    scangate_cmd(home).args(args).output().expect("run scangate")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("scangate-exit-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

#[test]
fn completion_unknown_shell_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "nope"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn completion_known_shell_succeeds() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "bash"]);
    assert!(out.status.success());
    assert!(!out.stdout.is_empty());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn protecode_without_group_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["protecode"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn protecode_invalid_cleanup_mode_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["protecode", "--cleanup-mode", "everything"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn protecode_without_target_exits_2() {
    let home = make_temp_home();
    let out = run(
        &home,
        &[
            "protecode",
            "--group",
            "g1",
            "--user",
            "scanner",
            "--password",
            "secret",
            "--server-url",
            "https://protecode.invalid",
        ],
    );
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("スキャン対象"), "stderr={stderr}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn checkmarx_missing_workspace_exits_2() {
    let home = make_temp_home();
    let out = run(
        &home,
        &[
            "checkmarx",
            "--username",
            "scanner",
            "--password",
            "secret",
            "--team",
            "/CxServer/team-a",
            "--project",
            "shop-backend",
            "--workspace",
            "/nonexistent/scangate-workspace",
        ],
    );
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn checkmarx_invalid_threshold_unit_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["checkmarx", "--threshold-unit", "ratio"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_show_succeeds_without_backend() {
    let home = make_temp_home();
    let out = run(&home, &["config", "--show"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        v.pointer("/protecode/cleanup_mode").and_then(|c| c.as_str()),
        Some("binary")
    );
    let _ = std::fs::remove_dir_all(&home);
}
