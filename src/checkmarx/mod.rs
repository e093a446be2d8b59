use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::core::SeverityCounts;

const CLIENT_ID: &str = "resource_owner_client";
const CLIENT_SECRET: &str = "014DF517-39D1-4453-B7B3-9930C563627C";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdUnit {
    Percentage,
    Absolute,
}

impl ThresholdUnit {
    pub const fn as_str(self) -> &'static str {
        match self {
            ThresholdUnit::Percentage => "percentage",
            ThresholdUnit::Absolute => "absolute",
        }
    }
}

impl FromStr for ThresholdUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" => Ok(ThresholdUnit::Percentage),
            "absolute" => Ok(ThresholdUnit::Absolute),
            other => Err(format!(
                "しきい値単位が不正です: {other}（percentage|absolute を指定してください）"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Thresholds {
    pub unit: ThresholdUnit,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

pub fn evaluate_thresholds(counts: &SeverityCounts, thresholds: &Thresholds) -> Vec<String> {
    let mut violations = Vec::new();
    let checks = [
        ("high", counts.high, thresholds.high),
        ("medium", counts.medium, thresholds.medium),
        ("low", counts.low, thresholds.low),
    ];

    for (severity, count, limit) in checks {
        match thresholds.unit {
            ThresholdUnit::Absolute => {
                if count > limit {
                    violations.push(format!(
                        "しきい値超過: {severity}={count}件（上限 {limit}件）"
                    ));
                }
            }
            ThresholdUnit::Percentage => {
                let total = counts.total();
                let share = if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                };
                if share > limit as f64 {
                    violations.push(format!(
                        "しきい値超過: {severity}={share:.1}%（上限 {limit}%、{count}/{total}件）"
                    ));
                }
            }
        }
    }

    violations
}

#[derive(Debug)]
pub struct SourceFilter {
    includes: GlobSet,
    include_count: usize,
    excludes: GlobSet,
}

impl SourceFilter {
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut includes = GlobSetBuilder::new();
        let mut include_count = 0usize;
        let mut excludes = GlobSetBuilder::new();

        for part in pattern.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(negated) = part.strip_prefix('!') {
                let negated = negated.trim();
                excludes.add(
                    Glob::new(negated)
                        .with_context(|| format!("フィルタパターンが不正です: !{negated}"))?,
                );
            } else {
                includes.add(
                    Glob::new(part)
                        .with_context(|| format!("フィルタパターンが不正です: {part}"))?,
                );
                include_count += 1;
            }
        }

        Ok(Self {
            includes: includes.build()?,
            include_count,
            excludes: excludes.build()?,
        })
    }

    pub fn matches(&self, relative: &Path) -> bool {
        if self.excludes.is_match(relative) {
            return false;
        }
        if self.include_count == 0 {
            return true;
        }
        self.includes.is_match(relative)
    }
}

pub fn zip_workspace(workspace: &Path, filter: &SourceFilter) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut archive = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut file_count = 0usize;
    for entry in WalkDir::new(workspace).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(workspace) else {
            continue;
        };
        if !filter.matches(relative) {
            continue;
        }

        let name = relative.to_string_lossy().replace('\\', "/");
        archive
            .start_file(name, options)
            .context("ZIPエントリの作成に失敗しました")?;
        let contents = std::fs::read(entry.path())
            .with_context(|| format!("ソースの読み取りに失敗しました: {}", entry.path().display()))?;
        archive
            .write_all(&contents)
            .context("ZIPエントリの書き込みに失敗しました")?;
        file_count += 1;
    }

    let cursor = archive.finish().context("ZIPの作成に失敗しました")?;
    drop(cursor);

    if file_count == 0 {
        return Err(crate::exit::invalid_args(format!(
            "フィルタに一致するソースがありません: {}",
            workspace.display()
        )));
    }

    Ok(buf)
}

#[derive(Debug, Clone)]
pub struct CheckmarxOptions {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub http_timeout: Duration,
}

pub struct CheckmarxClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Preset {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ScanCreated {
    id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanState {
    pub id: i64,
    pub status: ScanStatusName,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanStatusName {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatisticsResponse {
    #[serde(default)]
    high_severity: u64,
    #[serde(default)]
    medium_severity: u64,
    #[serde(default)]
    low_severity: u64,
    #[serde(default)]
    info_severity: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportCreated {
    report_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ReportStatus {
    status: ReportStatusValue,
}

#[derive(Debug, Clone, Deserialize)]
struct ReportStatusValue {
    value: String,
}

impl CheckmarxClient {
    pub fn login(opts: CheckmarxOptions) -> Result<Self> {
        let base_url = opts.server_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(crate::exit::invalid_args(
                "checkmarx: server_url が設定されていません",
            ));
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(opts.http_timeout)
            .build()
            .context("HTTPクライアントの構築に失敗しました")?;

        let params = [
            ("username", opts.username.as_str()),
            ("password", opts.password.as_str()),
            ("grant_type", "password"),
            ("scope", "sast_rest_api"),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
        ];
        let resp = http
            .post(format!("{base_url}/cxrestapi/auth/identity/connect/token"))
            .form(&params)
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("認証要求に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "認証")?;
        let token: TokenResponse = resp.json().context("認証応答(JSON)の解析に失敗しました")?;

        Ok(Self {
            http,
            base_url,
            token: token.access_token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::blocking::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
    }

    pub fn team_by_name(&self, full_name: &str) -> Result<Team> {
        let resp = self
            .request(reqwest::Method::GET, "/cxrestapi/auth/teams")
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("チーム一覧の取得に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "チーム一覧の取得")?;

        let teams: Vec<Team> = resp.json().context("チーム一覧(JSON)の解析に失敗しました")?;
        teams
            .into_iter()
            .find(|t| t.full_name == full_name)
            .ok_or_else(|| {
                crate::exit::invalid_args(format!("チームが見つかりません: {full_name}"))
            })
    }

    pub fn project_by_name(&self, team_id: &str, name: &str) -> Result<Option<Project>> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/cxrestapi/projects?projectName={name}&teamId={team_id}"),
            )
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("プロジェクトの照会に失敗しました"),
                )
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp, "プロジェクトの照会")?;

        let projects: Vec<Project> = resp
            .json()
            .context("プロジェクト応答(JSON)の解析に失敗しました")?;
        Ok(projects.into_iter().find(|p| p.name == name))
    }

    pub fn create_project(&self, team_id: &str, name: &str) -> Result<Project> {
        let body = serde_json::json!({
            "name": name,
            "owningTeam": team_id,
            "isPublic": true,
        });
        let resp = self
            .request(reqwest::Method::POST, "/cxrestapi/projects")
            .json(&body)
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("プロジェクトの作成に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "プロジェクトの作成")?;

        #[derive(Deserialize)]
        struct Created {
            id: i64,
        }
        let created: Created = resp
            .json()
            .context("プロジェクト作成応答(JSON)の解析に失敗しました")?;
        Ok(Project {
            id: created.id,
            name: name.to_string(),
        })
    }

    pub fn upload_sources(&self, project_id: i64, zipped: Vec<u8>) -> Result<()> {
        let part = reqwest::blocking::multipart::Part::bytes(zipped)
            .file_name("sources.zip")
            .mime_str("application/zip")
            .context("アップロードパートの構築に失敗しました")?;
        let form = reqwest::blocking::multipart::Form::new().part("zippedSource", part);

        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/cxrestapi/projects/{project_id}/sourceCode/attachments"),
            )
            .multipart(form)
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("ソースのアップロードに失敗しました"),
                )
            })?;
        check_status(resp, "ソースのアップロード")?;
        Ok(())
    }

    pub fn preset_id(&self, preset: &str) -> Result<Option<i64>> {
        let preset = preset.trim();
        if preset.is_empty() {
            return Ok(None);
        }
        if let Ok(id) = preset.parse::<i64>() {
            return Ok(Some(id));
        }

        let resp = self
            .request(reqwest::Method::GET, "/cxrestapi/sast/presets")
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("プリセット一覧の取得に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "プリセット一覧の取得")?;

        let presets: Vec<Preset> = resp
            .json()
            .context("プリセット一覧(JSON)の解析に失敗しました")?;
        presets
            .into_iter()
            .find(|p| p.name == preset)
            .map(|p| Some(p.id))
            .ok_or_else(|| {
                crate::exit::invalid_args(format!("プリセットが見つかりません: {preset}"))
            })
    }

    pub fn update_scan_settings(
        &self,
        project_id: i64,
        preset_id: Option<i64>,
        engine_configuration: &str,
    ) -> Result<()> {
        let Some(preset_id) = preset_id else {
            return Ok(());
        };
        let engine_configuration_id = engine_configuration.trim().parse::<i64>().unwrap_or(1);

        let body = serde_json::json!({
            "projectId": project_id,
            "presetId": preset_id,
            "engineConfigurationId": engine_configuration_id,
        });
        let resp = self
            .request(reqwest::Method::POST, "/cxrestapi/sast/scanSettings")
            .json(&body)
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("スキャン設定の更新に失敗しました"),
                )
            })?;
        check_status(resp, "スキャン設定の更新")?;
        Ok(())
    }

    pub fn scan_count(&self, project_id: i64) -> Result<u64> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/cxrestapi/sast/scans?projectId={project_id}&last=1000"),
            )
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("スキャン履歴の取得に失敗しました"),
                )
            })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let resp = check_status(resp, "スキャン履歴の取得")?;

        let scans: Vec<serde_json::Value> = resp
            .json()
            .context("スキャン履歴(JSON)の解析に失敗しました")?;
        Ok(scans.len() as u64)
    }

    pub fn trigger_scan(&self, project_id: i64, incremental: bool, force: bool) -> Result<i64> {
        let body = serde_json::json!({
            "projectId": project_id,
            "isIncremental": incremental,
            "isPublic": true,
            "forceScan": force,
        });
        let resp = self
            .request(reqwest::Method::POST, "/cxrestapi/sast/scans")
            .json(&body)
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("スキャンの開始に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "スキャンの開始")?;

        let created: ScanCreated = resp
            .json()
            .context("スキャン開始応答(JSON)の解析に失敗しました")?;
        Ok(created.id)
    }

    pub fn fetch_scan(&self, scan_id: i64) -> Result<ScanState> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/cxrestapi/sast/scans/{scan_id}"),
            )
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("スキャン状態の取得に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "スキャン状態の取得")?;

        let state: ScanState = resp
            .json()
            .context("スキャン状態応答(JSON)の解析に失敗しました")?;
        Ok(state)
    }

    pub fn poll_scan(
        &self,
        scan_id: i64,
        poll_interval: Duration,
        deadline: Instant,
        progress: Option<&indicatif::ProgressBar>,
    ) -> Result<ScanState> {
        let started = Instant::now();
        loop {
            let state = self.fetch_scan(scan_id)?;

            if let Some(pb) = progress {
                pb.set_message(format!(
                    "スキャン待機中 scan_id={scan_id} status={} 経過={}s",
                    state.status.name,
                    started.elapsed().as_secs()
                ));
            }

            match state.status.name.as_str() {
                "Finished" => return Ok(state),
                "Failed" | "Canceled" => {
                    return Err(crate::exit::scan_failed(format!(
                        "スキャンが失敗しました（scan_id={scan_id} status={}）",
                        state.status.name
                    )));
                }
                _ => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(anyhow!(
                    "スキャンがタイムアウトしました（scan_id={scan_id}、経過={}s）",
                    started.elapsed().as_secs()
                ));
            }

            let remaining = deadline.saturating_duration_since(now);
            std::thread::sleep(std::cmp::min(poll_interval, remaining));
        }
    }

    pub fn scan_statistics(&self, scan_id: i64) -> Result<SeverityCounts> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/cxrestapi/sast/scans/{scan_id}/resultsStatistics"),
            )
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("スキャン統計の取得に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "スキャン統計の取得")?;

        let stats: StatisticsResponse = resp
            .json()
            .context("スキャン統計(JSON)の解析に失敗しました")?;
        Ok(SeverityCounts {
            high: stats.high_severity,
            medium: stats.medium_severity,
            low: stats.low_severity,
            info: stats.info_severity,
        })
    }

    pub fn request_pdf_report(&self, scan_id: i64) -> Result<i64> {
        let body = serde_json::json!({
            "reportType": "PDF",
            "scanId": scan_id,
        });
        let resp = self
            .request(reqwest::Method::POST, "/cxrestapi/reports/sastScan")
            .json(&body)
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("レポート生成要求に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "レポート生成要求")?;

        let created: ReportCreated = resp
            .json()
            .context("レポート生成応答(JSON)の解析に失敗しました")?;
        Ok(created.report_id)
    }

    pub fn wait_for_report(
        &self,
        report_id: i64,
        poll_interval: Duration,
        deadline: Instant,
    ) -> Result<()> {
        loop {
            let resp = self
                .request(
                    reqwest::Method::GET,
                    &format!("/cxrestapi/reports/sastScan/{report_id}/status"),
                )
                .send()
                .map_err(|e| {
                    crate::exit::backend_unreachable_err(
                        anyhow::Error::new(e).context("レポート状態の取得に失敗しました"),
                    )
                })?;
            let resp = check_status(resp, "レポート状態の取得")?;

            let status: ReportStatus = resp
                .json()
                .context("レポート状態(JSON)の解析に失敗しました")?;
            match status.status.value.as_str() {
                "Created" => return Ok(()),
                "Failed" => {
                    return Err(anyhow!(
                        "レポート生成が失敗しました（report_id={report_id}）"
                    ));
                }
                _ => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(anyhow!(
                    "レポート生成がタイムアウトしました（report_id={report_id}）"
                ));
            }
            let remaining = deadline.saturating_duration_since(now);
            std::thread::sleep(std::cmp::min(poll_interval, remaining));
        }
    }

    pub fn download_report(&self, report_id: i64) -> Result<Vec<u8>> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/cxrestapi/reports/sastScan/{report_id}"),
            )
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("レポートの取得に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "レポートの取得")?;

        let bytes = resp.bytes().context("レポート本文の読み取りに失敗しました")?;
        Ok(bytes.to_vec())
    }
}

pub fn is_incremental(
    configured_incremental: bool,
    full_scans_scheduled: bool,
    full_scan_cycle: u64,
    previous_scan_count: u64,
) -> bool {
    if !configured_incremental {
        return false;
    }
    if full_scans_scheduled && full_scan_cycle > 0 && previous_scan_count % full_scan_cycle == 0 {
        return false;
    }
    true
}

fn check_status(
    resp: reqwest::blocking::Response,
    what: &str,
) -> Result<reqwest::blocking::Response> {
    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!(
            "バックエンドがエラーを返しました（{status}）: {what}"
        ));
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn threshold_unit_parses() {
        assert_eq!(
            "Percentage".parse::<ThresholdUnit>(),
            Ok(ThresholdUnit::Percentage)
        );
        assert_eq!(
            "absolute".parse::<ThresholdUnit>(),
            Ok(ThresholdUnit::Absolute)
        );
        assert!("ratio".parse::<ThresholdUnit>().is_err());
    }

    #[test]
    fn absolute_thresholds_compare_raw_counts() {
        let counts = SeverityCounts {
            high: 3,
            medium: 10,
            low: 0,
            info: 5,
        };
        let thresholds = Thresholds {
            unit: ThresholdUnit::Absolute,
            low: 10,
            medium: 10,
            high: 2,
        };
        let violations = evaluate_thresholds(&counts, &thresholds);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("high=3"));
    }

    #[test]
    fn percentage_thresholds_use_share_of_total() {
        let counts = SeverityCounts {
            high: 5,
            medium: 5,
            low: 90,
            info: 0,
        };
        let thresholds = Thresholds {
            unit: ThresholdUnit::Percentage,
            low: 50,
            medium: 100,
            high: 4,
        };
        let violations = evaluate_thresholds(&counts, &thresholds);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.contains("high=5.0%")));
        assert!(violations.iter().any(|v| v.contains("low=90.0%")));
    }

    #[test]
    fn no_issues_means_no_percentage_violations() {
        let counts = SeverityCounts::default();
        let thresholds = Thresholds {
            unit: ThresholdUnit::Percentage,
            low: 0,
            medium: 0,
            high: 0,
        };
        assert!(evaluate_thresholds(&counts, &thresholds).is_empty());
    }

    #[test]
    fn filter_negations_win_over_includes() {
        let filter = SourceFilter::parse("**/*.go, !**/vendor/**, !**/*_test.go").expect("filter");
        assert!(filter.matches(&PathBuf::from("cmd/main.go")));
        assert!(!filter.matches(&PathBuf::from("vendor/lib/lib.go")));
        assert!(!filter.matches(&PathBuf::from("cmd/main_test.go")));
        assert!(!filter.matches(&PathBuf::from("README.md")));
    }

    #[test]
    fn filter_without_includes_accepts_everything_not_excluded() {
        let filter = SourceFilter::parse("!**/node_modules/**").expect("filter");
        assert!(filter.matches(&PathBuf::from("src/app.ts")));
        assert!(!filter.matches(&PathBuf::from("node_modules/x/index.js")));
    }

    #[test]
    fn invalid_filter_pattern_is_an_error() {
        assert!(SourceFilter::parse("[").is_err());
    }

    #[test]
    fn incremental_cycle_forces_full_scan() {
        assert!(!is_incremental(true, true, 5, 0));
        assert!(is_incremental(true, true, 5, 1));
        assert!(is_incremental(true, true, 5, 4));
        assert!(!is_incremental(true, true, 5, 5));
        assert!(!is_incremental(false, true, 5, 3));
        assert!(is_incremental(true, false, 5, 5));
        assert!(is_incremental(true, true, 0, 0));
    }

    fn make_temp_dir(label: &str) -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static DIR_SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = DIR_SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("scangate-{label}-{}-{seq}", std::process::id()))
    }

    #[test]
    fn zip_workspace_packs_matching_files() {
        let dir = make_temp_dir("zip-test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("src")).expect("mkdirs");
        std::fs::create_dir_all(dir.join("vendor/dep")).expect("mkdirs");
        std::fs::write(dir.join("src/main.go"), b"package main").expect("write");
        std::fs::write(dir.join("vendor/dep/dep.go"), b"package dep").expect("write");

        let filter = SourceFilter::parse("**/*.go, !vendor/**").expect("filter");
        let bytes = zip_workspace(&dir, &filter).expect("zip");

        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("open archive");
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).expect("entry").name().to_string())
            .collect();
        assert_eq!(names, vec!["src/main.go".to_string()]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn zip_workspace_with_no_matches_is_invalid_args() {
        let dir = make_temp_dir("zip-empty");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("mkdirs");
        std::fs::write(dir.join("notes.txt"), b"hello").expect("write");

        let filter = SourceFilter::parse("**/*.go").expect("filter");
        let err = zip_workspace(&dir, &filter).unwrap_err();
        assert_eq!(crate::exit::exit_code(&err), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
