use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

fn base_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_scangate"));
    cmd.env("HOME", home);
    cmd.env_remove("SCANGATE_CONFIG");
    cmd.env_remove("SCANGATE_PROTECODE_GROUP");
    cmd.env_remove("SCANGATE_PROTECODE_CLEANUP_MODE");
    cmd
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("scangate-config-test-{}-{seq}", std::process::id()));
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

fn shown_group(out: &std::process::Output) -> String {
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    v.pointer("/protecode/group")
        .and_then(|g| g.as_str())
        .unwrap_or_default()
        .to_string()
}

#[test]
fn default_config_path_is_read_from_home() {
    let home = make_temp_home();
    write_file(
        home.join(".config/scangate/config.toml").as_path(),
        br#"
[protecode]
group = "from-home"
"#,
    );

    let out = base_cmd(&home)
        .args(["config", "--show"])
        .output()
        .expect("run scangate");
    assert!(out.status.success());
    assert_eq!(shown_group(&out), "from-home");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn cli_config_path_overrides_env_config_path() {
    let home = make_temp_home();

    let cfg_env = home.join("env-config.toml");
    let cfg_cli = home.join("cli-config.toml");
    write_file(
        cfg_env.as_path(),
        br#"
[protecode]
group = "from-env-path"
"#,
    );
    write_file(
        cfg_cli.as_path(),
        br#"
[protecode]
group = "from-cli-path"
"#,
    );

    let out = {
        let mut cmd = base_cmd(&home);
        cmd.env("SCANGATE_CONFIG", &cfg_env);
        cmd.arg("--config");
        cmd.arg(&cfg_cli);
        cmd.args(["config", "--show"]);
        cmd.output().expect("run scangate")
    };
    assert!(out.status.success());
    assert_eq!(shown_group(&out), "from-cli-path");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn env_config_path_is_used_when_cli_path_is_absent() {
    let home = make_temp_home();

    let cfg_env = home.join("env-config.toml");
    write_file(
        cfg_env.as_path(),
        br#"
[protecode]
group = "from-env-path"
"#,
    );

    let out = {
        let mut cmd = base_cmd(&home);
        cmd.env("SCANGATE_CONFIG", &cfg_env);
        cmd.args(["config", "--show"]);
        cmd.output().expect("run scangate")
    };
    assert!(out.status.success());
    assert_eq!(shown_group(&out), "from-env-path");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn broken_config_file_exits_2() {
    let home = make_temp_home();
    write_file(
        home.join(".config/scangate/config.toml").as_path(),
        b"[protecode\ngroup=",
    );

    let out = base_cmd(&home)
        .args(["config", "--show"])
        .output()
        .expect("run scangate");
    assert_eq!(out.status.code(), Some(2));

    let _ = std::fs::remove_dir_all(&home);
}
