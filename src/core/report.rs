use crate::core::{SeverityCounts, VulnCounts};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub schema_version: String,
    pub tool_version: String,
    pub backend: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vuln_counts: Option<VulnCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_counts: Option<SeverityCounts>,
    pub notes: Vec<String>,
    pub generated_at: String,
}
