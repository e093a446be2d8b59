use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::core::{SeverityCounts, VulnCounts};

pub const CONTAINER_PROPERTIES: &str = "commonPipelineEnvironment/appContainerProperties";
pub const PROTECODE_FIELDS: &str = "influx/protecode_data/fields";
pub const CHECKMARX_FIELDS: &str = "influx/checkmarx_data/fields";

#[derive(Debug, Clone, Default)]
pub struct CheckmarxMeta {
    pub scan_id: i64,
    pub project_id: i64,
    pub project_name: String,
    pub team: String,
    pub scan_type: String,
    pub preset: String,
}

pub fn write_resource_parameter(
    env_root: &Path,
    resource: &str,
    name: &str,
    value: &str,
) -> Result<PathBuf> {
    let dir = env_root.join(resource);
    std::fs::create_dir_all(&dir).with_context(|| {
        format!(
            "パイプライン環境ディレクトリの作成に失敗しました: {}",
            dir.display()
        )
    })?;

    let path = dir.join(name);
    std::fs::write(&path, value).with_context(|| {
        format!(
            "パイプライン環境の書き込みに失敗しました: {}",
            path.display()
        )
    })?;
    Ok(path)
}

fn write_all(env_root: &Path, resource: &str, pairs: &[(&str, String)]) -> Result<()> {
    let mut failed: Vec<String> = Vec::new();
    for (name, value) in pairs {
        if let Err(err) = write_resource_parameter(env_root, resource, name, value) {
            failed.push(format!("{name}: {err:#}"));
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "パイプライン環境のエクスポートに失敗しました:\n{}",
            failed.join("\n")
        ))
    }
}

pub fn export_protecode(env_root: &Path, counts: &VulnCounts) -> Result<()> {
    let container: Vec<(&str, String)> = vec![
        ("protecodeCount", counts.count.to_string()),
        ("cvss2GreaterOrEqualSeven", counts.cvss2_ge_seven.to_string()),
        ("cvss3GreaterOrEqualSeven", counts.cvss3_ge_seven.to_string()),
        ("excluded_vulnerabilities", counts.excluded.to_string()),
        ("triaged_vulnerabilities", counts.triaged.to_string()),
        ("historical_vulnerabilities", counts.historical.to_string()),
    ];
    write_all(env_root, CONTAINER_PROPERTIES, &container)?;

    let fields: Vec<(&str, String)> = vec![
        ("historical_vulnerabilities", counts.historical.to_string()),
        ("triaged_vulnerabilities", counts.triaged.to_string()),
        ("excluded_vulnerabilities", counts.excluded.to_string()),
        ("minor_vulnerabilities", counts.minor.to_string()),
        ("major_vulnerabilities", counts.major.to_string()),
        ("vulnerabilities", counts.vulnerabilities.to_string()),
    ];
    write_all(env_root, PROTECODE_FIELDS, &fields)
}

pub fn export_checkmarx(
    env_root: &Path,
    counts: &SeverityCounts,
    meta: &CheckmarxMeta,
) -> Result<()> {
    let fields: Vec<(&str, String)> = vec![
        ("high_issues", counts.high.to_string()),
        ("medium_issues", counts.medium.to_string()),
        ("low_issues", counts.low.to_string()),
        ("information_issues", counts.info.to_string()),
        ("scan_id", meta.scan_id.to_string()),
        ("project_id", meta.project_id.to_string()),
        ("project_name", meta.project_name.clone()),
        ("team", meta.team.clone()),
        ("scan_type", meta.scan_type.clone()),
        ("preset", meta.preset.clone()),
    ];
    write_all(env_root, CHECKMARX_FIELDS, &fields)
}
