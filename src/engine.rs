use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::checkmarx::{CheckmarxClient, CheckmarxOptions, SourceFilter, Thresholds};
use crate::config::EffectiveConfig;
use crate::core::{ProductStatus, ScanReport};
use crate::protecode::{ProtecodeClient, ProtecodeOptions};
use crate::stepenv::CheckmarxMeta;
use crate::target::TargetRequest;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub http_timeout: Duration,
    pub show_progress: bool,
}

pub struct Engine {
    opts: EngineOptions,
    cfg: EffectiveConfig,
}

#[derive(Debug, Clone)]
pub struct ProtecodeRequest {
    pub target: TargetRequest,
}

#[derive(Debug, Clone)]
pub struct CheckmarxRequest {
    pub workspace: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub report: ScanReport,
    pub violations: Vec<String>,
}

impl Engine {
    pub fn new(cfg: EffectiveConfig, opts: EngineOptions) -> Self {
        Self { opts, cfg }
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.cfg
    }

    pub fn run_protecode(&self, req: ProtecodeRequest) -> Result<ScanOutcome> {
        let p = &self.cfg.protecode;
        if p.group.trim().is_empty() {
            return Err(crate::exit::invalid_args(
                "protecode: group が設定されていません",
            ));
        }
        if p.user.trim().is_empty() || p.password.is_empty() {
            return Err(crate::exit::invalid_args(
                "protecode: user / password が設定されていません",
            ));
        }

        let step_timeout = Duration::from_secs(p.timeout_minutes.max(1) * 60);
        let target = crate::target::resolve(
            &req.target,
            &self.cfg.docker,
            &PathBuf::from(".scangate/cache"),
            step_timeout,
        )?;

        let client = ProtecodeClient::new(ProtecodeOptions {
            server_url: p.server_url.clone(),
            user: p.user.clone(),
            password: p.password.clone(),
            http_timeout: self.opts.http_timeout,
        })?;

        let mut notes = vec![format!("対象: {}", target.describe())];
        let delete_binary = p.cleanup_mode.delete_binary();

        let mut product_id: Option<i64> = None;
        if p.reuse_existing {
            if let crate::target::ScanTarget::File(path) = &target {
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                product_id = client.load_existing_product(&p.group, file_name)?;
                if let Some(id) = product_id {
                    notes.push(format!("再利用: 既存プロダクトを使用します（product_id={id}）"));
                }
            }
        }

        let product_id = match product_id {
            Some(id) if id > 0 => id,
            _ => {
                let result = match &target {
                    crate::target::ScanTarget::File(path) => {
                        client.upload_file(&p.group, path, delete_binary)?
                    }
                    crate::target::ScanTarget::FetchUrl(url) => {
                        client.declare_fetch_url(&p.group, url, delete_binary)?
                    }
                };
                result.product_id
            }
        };

        if product_id <= 0 {
            return Err(crate::exit::scan_failed(format!(
                "スキャンを開始できませんでした（product_id={product_id} が不正です）"
            )));
        }

        let pb = self.spinner();
        let deadline = Instant::now() + step_timeout;
        let poll_interval = Duration::from_secs(p.poll_interval_secs.max(1));
        let result = client.poll_for_result(product_id, poll_interval, deadline, pb.as_ref());
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let result = result?;

        let status = result.status.unwrap_or(ProductStatus::Busy);
        if status == ProductStatus::Failed {
            return Err(crate::exit::scan_failed(format!(
                "バックエンドがスキャン失敗を報告しました（product_id={product_id}）。バックエンド側のログを確認してください"
            )));
        }

        let report_bytes = client.load_report(product_id)?;
        std::fs::write(&p.report_file_name, report_bytes).with_context(|| {
            format!("レポートの書き込みに失敗しました: {}", p.report_file_name)
        })?;
        notes.push(format!("レポート: {}", p.report_file_name));

        client.delete_scan(p.cleanup_mode, product_id)?;
        if p.cleanup_mode.delete_product() {
            notes.push("クリーンアップ: プロダクトを削除しました".to_string());
        }

        let counts = crate::protecode::parse_counts(&result, &p.exclude_cves);
        crate::stepenv::export_protecode(std::path::Path::new(&self.cfg.general.env_root), &counts)?;
        notes.push(format!(
            "エクスポート: {}",
            self.cfg.general.env_root
        ));

        let mut violations = Vec::new();
        if p.fail_on_severe && counts.severe() > 0 {
            violations.push(format!(
                "重大な脆弱性が検出されました（cvss2>=7: {}件, cvss3>=7: {}件）",
                counts.cvss2_ge_seven, counts.cvss3_ge_seven
            ));
        }
        notes.extend(violations.iter().cloned());
        notes.sort();
        notes.dedup();

        Ok(ScanOutcome {
            report: ScanReport {
                schema_version: "1.0".to_string(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                backend: "protecode".to_string(),
                target: target.describe(),
                product_id: Some(product_id),
                status: status.to_string(),
                report_file: Some(p.report_file_name.clone()),
                vuln_counts: Some(counts),
                severity_counts: None,
                notes,
                generated_at: generated_at(),
            },
            violations,
        })
    }

    pub fn run_checkmarx(&self, req: CheckmarxRequest) -> Result<ScanOutcome> {
        let c = &self.cfg.checkmarx;
        if c.username.trim().is_empty() || c.password.is_empty() {
            return Err(crate::exit::invalid_args(
                "checkmarx: username / password が設定されていません",
            ));
        }
        if c.project_name.trim().is_empty() {
            return Err(crate::exit::invalid_args(
                "checkmarx: project_name が設定されていません",
            ));
        }
        if c.team_name.trim().is_empty() {
            return Err(crate::exit::invalid_args(
                "checkmarx: team_name が設定されていません",
            ));
        }
        if !req.workspace.is_dir() {
            return Err(crate::exit::invalid_args(format!(
                "ワークスペースが見つかりません: {}",
                req.workspace.display()
            )));
        }

        let filter =
            SourceFilter::parse(&c.filter_pattern).map_err(crate::exit::invalid_args_err)?;

        let client = CheckmarxClient::login(CheckmarxOptions {
            server_url: c.server_url.clone(),
            username: c.username.clone(),
            password: c.password.clone(),
            http_timeout: self.opts.http_timeout,
        })?;

        let mut notes = vec![format!("対象: {}", req.workspace.display())];

        let team = client.team_by_name(&c.team_name)?;
        let project = match client.project_by_name(&team.id, &c.project_name)? {
            Some(project) => project,
            None => {
                let project = client.create_project(&team.id, &c.project_name)?;
                notes.push(format!("プロジェクトを作成しました: {}", project.name));
                project
            }
        };

        let zipped = crate::checkmarx::zip_workspace(&req.workspace, &filter)?;
        client.upload_sources(project.id, zipped)?;

        let preset_id = client.preset_id(&c.preset)?;
        client.update_scan_settings(project.id, preset_id, &c.engine_configuration)?;

        let previous_scans = client.scan_count(project.id)?;
        let incremental = crate::checkmarx::is_incremental(
            c.incremental,
            c.full_scans_scheduled,
            c.full_scan_cycle,
            previous_scans,
        );
        let scan_type = if incremental { "Incremental" } else { "Full" };
        notes.push(format!("スキャン種別: {scan_type}（実行履歴 {previous_scans}件）"));

        let scan_id =
            client.trigger_scan(project.id, incremental, !c.avoid_duplicate_scans)?;

        let pb = self.spinner();
        let step_timeout = Duration::from_secs(c.timeout_minutes.max(1) * 60);
        let deadline = Instant::now() + step_timeout;
        let poll_interval = Duration::from_secs(c.poll_interval_secs.max(1));
        let state = client.poll_scan(scan_id, poll_interval, deadline, pb.as_ref());
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let state = state?;

        let counts = client.scan_statistics(scan_id)?;

        let mut report_file = None;
        if c.generate_pdf_report {
            let report_id = client.request_pdf_report(scan_id)?;
            client.wait_for_report(report_id, poll_interval, deadline)?;
            let bytes = client.download_report(report_id)?;
            std::fs::write(&c.report_file_name, bytes).with_context(|| {
                format!("レポートの書き込みに失敗しました: {}", c.report_file_name)
            })?;
            notes.push(format!("レポート: {}", c.report_file_name));
            report_file = Some(c.report_file_name.clone());
        }

        let meta = CheckmarxMeta {
            scan_id,
            project_id: project.id,
            project_name: project.name.clone(),
            team: team.full_name.clone(),
            scan_type: scan_type.to_string(),
            preset: c.preset.clone(),
        };
        crate::stepenv::export_checkmarx(
            std::path::Path::new(&self.cfg.general.env_root),
            &counts,
            &meta,
        )?;
        notes.push(format!("エクスポート: {}", self.cfg.general.env_root));

        let mut violations = Vec::new();
        if c.threshold_enabled {
            violations = crate::checkmarx::evaluate_thresholds(
                &counts,
                &Thresholds {
                    unit: c.threshold_unit,
                    low: c.threshold_low,
                    medium: c.threshold_medium,
                    high: c.threshold_high,
                },
            );
        }
        notes.extend(violations.iter().cloned());
        notes.sort();
        notes.dedup();

        Ok(ScanOutcome {
            report: ScanReport {
                schema_version: "1.0".to_string(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                backend: "checkmarx".to_string(),
                target: req.workspace.display().to_string(),
                product_id: Some(scan_id),
                status: state.status.name,
                report_file,
                vuln_counts: None,
                severity_counts: Some(counts),
                notes,
                generated_at: generated_at(),
            },
            violations,
        })
    }

    fn spinner(&self) -> Option<indicatif::ProgressBar> {
        use std::io::IsTerminal;
        if !(self.opts.show_progress && std::io::stderr().is_terminal()) {
            return None;
        }
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message("スキャン待機中...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

fn generated_at() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
