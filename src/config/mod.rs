use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::checkmarx::ThresholdUnit;
use crate::core::CleanupMode;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub general: GeneralConfig,
    pub docker: DockerConfig,
    pub protecode: ProtecodeConfig,
    pub checkmarx: CheckmarxConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneralConfig {
    pub env_root: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DockerConfig {
    pub registry_url: String,
    pub registry_protocol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtecodeConfig {
    pub server_url: String,
    pub group: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub timeout_minutes: u64,
    pub poll_interval_secs: u64,
    pub cleanup_mode: CleanupMode,
    pub report_file_name: String,
    pub exclude_cves: Vec<String>,
    pub fail_on_severe: bool,
    pub reuse_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckmarxConfig {
    pub server_url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub team_name: String,
    pub project_name: String,
    pub preset: String,
    pub engine_configuration: String,
    pub incremental: bool,
    pub full_scans_scheduled: bool,
    pub full_scan_cycle: u64,
    pub avoid_duplicate_scans: bool,
    pub generate_pdf_report: bool,
    pub report_file_name: String,
    pub filter_pattern: String,
    pub timeout_minutes: u64,
    pub poll_interval_secs: u64,
    pub threshold_enabled: bool,
    pub threshold_unit: ThresholdUnit,
    pub threshold_low: u64,
    pub threshold_medium: u64,
    pub threshold_high: u64,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                env_root: ".pipeline".to_string(),
            },
            docker: DockerConfig {
                registry_url: String::new(),
                registry_protocol: "https".to_string(),
            },
            protecode: ProtecodeConfig {
                server_url: String::new(),
                group: String::new(),
                user: String::new(),
                password: String::new(),
                timeout_minutes: 60,
                poll_interval_secs: 10,
                cleanup_mode: CleanupMode::Binary,
                report_file_name: "protecode_report.pdf".to_string(),
                exclude_cves: Vec::new(),
                fail_on_severe: true,
                reuse_existing: false,
            },
            checkmarx: CheckmarxConfig {
                server_url: String::new(),
                username: String::new(),
                password: String::new(),
                team_name: String::new(),
                project_name: String::new(),
                preset: String::new(),
                engine_configuration: "1".to_string(),
                incremental: true,
                full_scans_scheduled: true,
                full_scan_cycle: 5,
                avoid_duplicate_scans: false,
                generate_pdf_report: true,
                report_file_name: "checkmarx_report.pdf".to_string(),
                filter_pattern:
                    "!**/node_modules/**, !**/.git/**, !**/vendor/**, !**/*_test.go, **/*.html, **/*.xml, **/*.go, **/*.py, **/*.js, **/*.scala, **/*.ts"
                        .to_string(),
                timeout_minutes: 60,
                poll_interval_secs: 10,
                threshold_enabled: true,
                threshold_unit: ThresholdUnit::Percentage,
                threshold_low: 10,
                threshold_medium: 100,
                threshold_high: 100,
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    general: Option<RawGeneralConfig>,
    docker: Option<RawDockerConfig>,
    protecode: Option<RawProtecodeConfig>,
    checkmarx: Option<RawCheckmarxConfig>,
}

#[derive(Debug, Deserialize)]
struct RawGeneralConfig {
    env_root: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDockerConfig {
    registry_url: Option<String>,
    registry_protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProtecodeConfig {
    server_url: Option<String>,
    group: Option<String>,
    user: Option<String>,
    password: Option<String>,
    timeout_minutes: Option<u64>,
    poll_interval_secs: Option<u64>,
    cleanup_mode: Option<CleanupMode>,
    report_file_name: Option<String>,
    exclude_cves: Option<Vec<String>>,
    fail_on_severe: Option<bool>,
    reuse_existing: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawCheckmarxConfig {
    server_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    team_name: Option<String>,
    project_name: Option<String>,
    preset: Option<String>,
    engine_configuration: Option<String>,
    incremental: Option<bool>,
    full_scans_scheduled: Option<bool>,
    full_scan_cycle: Option<u64>,
    avoid_duplicate_scans: Option<bool>,
    generate_pdf_report: Option<bool>,
    report_file_name: Option<String>,
    filter_pattern: Option<String>,
    timeout_minutes: Option<u64>,
    poll_interval_secs: Option<u64>,
    threshold_enabled: Option<bool>,
    threshold_unit: Option<ThresholdUnit>,
    threshold_low: Option<u64>,
    threshold_medium: Option<u64>,
    threshold_high: Option<u64>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/scangate/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("設定ファイルの読み取りに失敗しました: {}", path.display()))?;
        let raw: RawConfig =
            toml::from_str(&s).context("設定ファイル(TOML)の解析に失敗しました")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(general) = raw.general {
        if let Some(env_root) = general.env_root {
            cfg.general.env_root = env_root;
        }
    }

    if let Some(docker) = raw.docker {
        if let Some(registry_url) = docker.registry_url {
            cfg.docker.registry_url = registry_url;
        }
        if let Some(registry_protocol) = docker.registry_protocol {
            cfg.docker.registry_protocol = registry_protocol;
        }
    }

    if let Some(p) = raw.protecode {
        if let Some(server_url) = p.server_url {
            cfg.protecode.server_url = server_url;
        }
        if let Some(group) = p.group {
            cfg.protecode.group = group;
        }
        if let Some(user) = p.user {
            cfg.protecode.user = user;
        }
        if let Some(password) = p.password {
            cfg.protecode.password = password;
        }
        if let Some(timeout_minutes) = p.timeout_minutes {
            cfg.protecode.timeout_minutes = timeout_minutes;
        }
        if let Some(poll_interval_secs) = p.poll_interval_secs {
            cfg.protecode.poll_interval_secs = poll_interval_secs;
        }
        if let Some(cleanup_mode) = p.cleanup_mode {
            cfg.protecode.cleanup_mode = cleanup_mode;
        }
        if let Some(report_file_name) = p.report_file_name {
            cfg.protecode.report_file_name = report_file_name;
        }
        if let Some(exclude_cves) = p.exclude_cves {
            cfg.protecode.exclude_cves = exclude_cves;
        }
        if let Some(fail_on_severe) = p.fail_on_severe {
            cfg.protecode.fail_on_severe = fail_on_severe;
        }
        if let Some(reuse_existing) = p.reuse_existing {
            cfg.protecode.reuse_existing = reuse_existing;
        }
    }

    if let Some(c) = raw.checkmarx {
        if let Some(server_url) = c.server_url {
            cfg.checkmarx.server_url = server_url;
        }
        if let Some(username) = c.username {
            cfg.checkmarx.username = username;
        }
        if let Some(password) = c.password {
            cfg.checkmarx.password = password;
        }
        if let Some(team_name) = c.team_name {
            cfg.checkmarx.team_name = team_name;
        }
        if let Some(project_name) = c.project_name {
            cfg.checkmarx.project_name = project_name;
        }
        if let Some(preset) = c.preset {
            cfg.checkmarx.preset = preset;
        }
        if let Some(engine_configuration) = c.engine_configuration {
            cfg.checkmarx.engine_configuration = engine_configuration;
        }
        if let Some(incremental) = c.incremental {
            cfg.checkmarx.incremental = incremental;
        }
        if let Some(full_scans_scheduled) = c.full_scans_scheduled {
            cfg.checkmarx.full_scans_scheduled = full_scans_scheduled;
        }
        if let Some(full_scan_cycle) = c.full_scan_cycle {
            cfg.checkmarx.full_scan_cycle = full_scan_cycle;
        }
        if let Some(avoid_duplicate_scans) = c.avoid_duplicate_scans {
            cfg.checkmarx.avoid_duplicate_scans = avoid_duplicate_scans;
        }
        if let Some(generate_pdf_report) = c.generate_pdf_report {
            cfg.checkmarx.generate_pdf_report = generate_pdf_report;
        }
        if let Some(report_file_name) = c.report_file_name {
            cfg.checkmarx.report_file_name = report_file_name;
        }
        if let Some(filter_pattern) = c.filter_pattern {
            cfg.checkmarx.filter_pattern = filter_pattern;
        }
        if let Some(timeout_minutes) = c.timeout_minutes {
            cfg.checkmarx.timeout_minutes = timeout_minutes;
        }
        if let Some(poll_interval_secs) = c.poll_interval_secs {
            cfg.checkmarx.poll_interval_secs = poll_interval_secs;
        }
        if let Some(threshold_enabled) = c.threshold_enabled {
            cfg.checkmarx.threshold_enabled = threshold_enabled;
        }
        if let Some(threshold_unit) = c.threshold_unit {
            cfg.checkmarx.threshold_unit = threshold_unit;
        }
        if let Some(threshold_low) = c.threshold_low {
            cfg.checkmarx.threshold_low = threshold_low;
        }
        if let Some(threshold_medium) = c.threshold_medium {
            cfg.checkmarx.threshold_medium = threshold_medium;
        }
        if let Some(threshold_high) = c.threshold_high {
            cfg.checkmarx.threshold_high = threshold_high;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("SCANGATE_ENV_ROOT") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.general.env_root = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("SCANGATE_DOCKER_REGISTRY_URL") {
        cfg.docker.registry_url = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_DOCKER_REGISTRY_PROTOCOL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.docker.registry_protocol = v.to_string();
        }
    }

    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_SERVER_URL") {
        cfg.protecode.server_url = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_GROUP") {
        cfg.protecode.group = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_USER") {
        cfg.protecode.user = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_PASSWORD") {
        cfg.protecode.password = v;
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_TIMEOUT_MINUTES") {
        cfg.protecode.timeout_minutes = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SCANGATE_PROTECODE_TIMEOUT_MINUTES")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_POLL_INTERVAL_SECS") {
        cfg.protecode.poll_interval_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SCANGATE_PROTECODE_POLL_INTERVAL_SECS")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_CLEANUP_MODE") {
        cfg.protecode.cleanup_mode = v
            .parse::<CleanupMode>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "SCANGATE_PROTECODE_CLEANUP_MODE")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_REPORT_FILE_NAME") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.protecode.report_file_name = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_EXCLUDE_CVES") {
        let parts: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        if !parts.is_empty() {
            cfg.protecode.exclude_cves = parts;
        }
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_FAIL_ON_SEVERE") {
        cfg.protecode.fail_on_severe =
            parse_bool(&v).with_context(|| "SCANGATE_PROTECODE_FAIL_ON_SEVERE")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_PROTECODE_REUSE_EXISTING") {
        cfg.protecode.reuse_existing =
            parse_bool(&v).with_context(|| "SCANGATE_PROTECODE_REUSE_EXISTING")?;
    }

    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_SERVER_URL") {
        cfg.checkmarx.server_url = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_USERNAME") {
        cfg.checkmarx.username = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_PASSWORD") {
        cfg.checkmarx.password = v;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_TEAM_NAME") {
        cfg.checkmarx.team_name = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_PROJECT_NAME") {
        cfg.checkmarx.project_name = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_PRESET") {
        cfg.checkmarx.preset = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_ENGINE_CONFIGURATION") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.checkmarx.engine_configuration = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_INCREMENTAL") {
        cfg.checkmarx.incremental =
            parse_bool(&v).with_context(|| "SCANGATE_CHECKMARX_INCREMENTAL")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_FULL_SCANS_SCHEDULED") {
        cfg.checkmarx.full_scans_scheduled =
            parse_bool(&v).with_context(|| "SCANGATE_CHECKMARX_FULL_SCANS_SCHEDULED")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_FULL_SCAN_CYCLE") {
        cfg.checkmarx.full_scan_cycle = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SCANGATE_CHECKMARX_FULL_SCAN_CYCLE")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_AVOID_DUPLICATE_SCANS") {
        cfg.checkmarx.avoid_duplicate_scans =
            parse_bool(&v).with_context(|| "SCANGATE_CHECKMARX_AVOID_DUPLICATE_SCANS")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_GENERATE_PDF_REPORT") {
        cfg.checkmarx.generate_pdf_report =
            parse_bool(&v).with_context(|| "SCANGATE_CHECKMARX_GENERATE_PDF_REPORT")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_REPORT_FILE_NAME") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.checkmarx.report_file_name = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_FILTER_PATTERN") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.checkmarx.filter_pattern = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_TIMEOUT_MINUTES") {
        cfg.checkmarx.timeout_minutes = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SCANGATE_CHECKMARX_TIMEOUT_MINUTES")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_POLL_INTERVAL_SECS") {
        cfg.checkmarx.poll_interval_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SCANGATE_CHECKMARX_POLL_INTERVAL_SECS")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_THRESHOLD_ENABLED") {
        cfg.checkmarx.threshold_enabled =
            parse_bool(&v).with_context(|| "SCANGATE_CHECKMARX_THRESHOLD_ENABLED")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_THRESHOLD_UNIT") {
        cfg.checkmarx.threshold_unit = v
            .parse::<ThresholdUnit>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "SCANGATE_CHECKMARX_THRESHOLD_UNIT")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_THRESHOLD_LOW") {
        cfg.checkmarx.threshold_low = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SCANGATE_CHECKMARX_THRESHOLD_LOW")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_THRESHOLD_MEDIUM") {
        cfg.checkmarx.threshold_medium = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SCANGATE_CHECKMARX_THRESHOLD_MEDIUM")?;
    }
    if let Ok(v) = std::env::var("SCANGATE_CHECKMARX_THRESHOLD_HIGH") {
        cfg.checkmarx.threshold_high = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SCANGATE_CHECKMARX_THRESHOLD_HIGH")?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "真偽値が不正です: {s}（true|false|1|0|yes|no|on|off を指定してください）"
        )),
    }
}
