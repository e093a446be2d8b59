use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::checkmarx::ThresholdUnit;
use crate::core::CleanupMode;
use crate::engine::{CheckmarxRequest, Engine, EngineOptions, ProtecodeRequest};
use crate::target::TargetRequest;
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "scangate",
    version,
    about = "CI/CDパイプラインの一工程として外部セキュリティスキャナ（Protecode/Checkmarx）を実行し、結果カウンタをパイプライン環境へ出力する"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = 120, global = true)]
    pub timeout: u64,
    #[arg(long, global = true)]
    pub env_root: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Protecode(ProtecodeArgs),
    Checkmarx(CheckmarxArgs),
    Config(ConfigArgs),
    Completion(CompletionArgs),
}

#[derive(Debug, Args)]
pub struct ProtecodeArgs {
    #[arg(long)]
    pub image: Option<String>,
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[arg(long)]
    pub fetch_url: Option<String>,
    #[arg(long)]
    pub server_url: Option<String>,
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub timeout_minutes: Option<u64>,
    #[arg(long)]
    pub cleanup_mode: Option<CleanupMode>,
    #[arg(long)]
    pub report_file: Option<String>,
    #[arg(long)]
    pub exclude_cve: Vec<String>,
    #[arg(long)]
    pub reuse_existing: bool,
    #[arg(long)]
    pub no_fail_on_severe: bool,
    #[arg(long)]
    pub registry_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckmarxArgs {
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,
    #[arg(long)]
    pub server_url: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub team: Option<String>,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub preset: Option<String>,
    #[arg(long)]
    pub engine_configuration: Option<String>,
    #[arg(long)]
    pub filter_pattern: Option<String>,
    #[arg(long)]
    pub timeout_minutes: Option<u64>,
    #[arg(long)]
    pub full: bool,
    #[arg(long)]
    pub avoid_duplicate_scans: bool,
    #[arg(long)]
    pub no_pdf_report: bool,
    #[arg(long)]
    pub report_file: Option<String>,
    #[arg(long)]
    pub no_thresholds: bool,
    #[arg(long)]
    pub threshold_unit: Option<ThresholdUnit>,
    #[arg(long)]
    pub threshold_low: Option<u64>,
    #[arg(long)]
    pub threshold_medium: Option<u64>,
    #[arg(long)]
    pub threshold_high: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::platform::effective_home_dir()?;

    let env_config_path = std::env::var_os("SCANGATE_CONFIG").map(PathBuf::from);
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    if let Some(env_root) = &cli.env_root {
        cfg.general.env_root = env_root.clone();
    }

    let color = stdout_is_tty && !cli.no_color;
    let ui_cfg = UiConfig {
        color,
        stdout_is_tty,
        stderr_is_tty,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Protecode(args) => {
            apply_protecode_args(&mut cfg, &args);
            let engine = Engine::new(
                cfg,
                EngineOptions {
                    http_timeout: Duration::from_secs(cli.timeout),
                    show_progress: stderr_is_tty && !cli.quiet && !cli.json,
                },
            );
            let outcome = engine.run_protecode(ProtecodeRequest {
                target: TargetRequest {
                    file: args.file.clone(),
                    fetch_url: args.fetch_url.clone(),
                    image: args.image.clone(),
                },
            })?;

            if cli.json {
                write_json(&outcome.report)?;
            } else {
                crate::ui::print_scan_summary(&outcome.report, &ui_cfg);
            }
            if !outcome.violations.is_empty() {
                return Err(crate::exit::scan_failed(outcome.violations.join("\n")));
            }
        }
        Commands::Checkmarx(args) => {
            apply_checkmarx_args(&mut cfg, &args);
            let engine = Engine::new(
                cfg,
                EngineOptions {
                    http_timeout: Duration::from_secs(cli.timeout),
                    show_progress: stderr_is_tty && !cli.quiet && !cli.json,
                },
            );
            let outcome = engine.run_checkmarx(CheckmarxRequest {
                workspace: args.workspace.clone(),
            })?;

            if cli.json {
                write_json(&outcome.report)?;
            } else {
                crate::ui::print_scan_summary(&outcome.report, &ui_cfg);
            }
            if !outcome.violations.is_empty() {
                return Err(crate::exit::scan_failed(outcome.violations.join("\n")));
            }
        }
        Commands::Config(_args) => {
            write_json(&cfg)?;
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}

fn apply_protecode_args(cfg: &mut crate::config::EffectiveConfig, args: &ProtecodeArgs) {
    if let Some(server_url) = &args.server_url {
        cfg.protecode.server_url = server_url.clone();
    }
    if let Some(group) = &args.group {
        cfg.protecode.group = group.clone();
    }
    if let Some(user) = &args.user {
        cfg.protecode.user = user.clone();
    }
    if let Some(password) = &args.password {
        cfg.protecode.password = password.clone();
    }
    if let Some(timeout_minutes) = args.timeout_minutes {
        cfg.protecode.timeout_minutes = timeout_minutes;
    }
    if let Some(cleanup_mode) = args.cleanup_mode {
        cfg.protecode.cleanup_mode = cleanup_mode;
    }
    if let Some(report_file) = &args.report_file {
        cfg.protecode.report_file_name = report_file.clone();
    }
    if !args.exclude_cve.is_empty() {
        let mut exclude = cfg.protecode.exclude_cves.clone();
        exclude.extend(args.exclude_cve.iter().cloned());
        exclude.sort();
        exclude.dedup();
        cfg.protecode.exclude_cves = exclude;
    }
    if args.reuse_existing {
        cfg.protecode.reuse_existing = true;
    }
    if args.no_fail_on_severe {
        cfg.protecode.fail_on_severe = false;
    }
    if let Some(registry_url) = &args.registry_url {
        cfg.docker.registry_url = registry_url.clone();
    }
}

fn apply_checkmarx_args(cfg: &mut crate::config::EffectiveConfig, args: &CheckmarxArgs) {
    if let Some(server_url) = &args.server_url {
        cfg.checkmarx.server_url = server_url.clone();
    }
    if let Some(username) = &args.username {
        cfg.checkmarx.username = username.clone();
    }
    if let Some(password) = &args.password {
        cfg.checkmarx.password = password.clone();
    }
    if let Some(team) = &args.team {
        cfg.checkmarx.team_name = team.clone();
    }
    if let Some(project) = &args.project {
        cfg.checkmarx.project_name = project.clone();
    }
    if let Some(preset) = &args.preset {
        cfg.checkmarx.preset = preset.clone();
    }
    if let Some(engine_configuration) = &args.engine_configuration {
        cfg.checkmarx.engine_configuration = engine_configuration.clone();
    }
    if let Some(filter_pattern) = &args.filter_pattern {
        cfg.checkmarx.filter_pattern = filter_pattern.clone();
    }
    if let Some(timeout_minutes) = args.timeout_minutes {
        cfg.checkmarx.timeout_minutes = timeout_minutes;
    }
    if args.full {
        cfg.checkmarx.incremental = false;
    }
    if args.avoid_duplicate_scans {
        cfg.checkmarx.avoid_duplicate_scans = true;
    }
    if args.no_pdf_report {
        cfg.checkmarx.generate_pdf_report = false;
    }
    if let Some(report_file) = &args.report_file {
        cfg.checkmarx.report_file_name = report_file.clone();
    }
    if args.no_thresholds {
        cfg.checkmarx.threshold_enabled = false;
    }
    if let Some(threshold_unit) = args.threshold_unit {
        cfg.checkmarx.threshold_unit = threshold_unit;
    }
    if let Some(threshold_low) = args.threshold_low {
        cfg.checkmarx.threshold_low = threshold_low;
    }
    if let Some(threshold_medium) = args.threshold_medium {
        cfg.checkmarx.threshold_medium = threshold_medium;
    }
    if let Some(threshold_high) = args.threshold_high {
        cfg.checkmarx.threshold_high = threshold_high;
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    match s.trim().to_ascii_lowercase().as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        "elvish" => Ok(clap_complete::Shell::Elvish),
        "powershell" => Ok(clap_complete::Shell::PowerShell),
        other => Err(crate::exit::invalid_args(format!(
            "未対応のシェルです: {other}（bash|zsh|fish|elvish|powershell を指定してください）"
        ))),
    }
}

fn write_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    use std::io::Write;
    writeln!(stdout)?;
    Ok(())
}
