use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::{CleanupMode, ProductStatus, VulnCounts};

#[derive(Debug, Clone)]
pub struct ProtecodeOptions {
    pub server_url: String,
    pub user: String,
    pub password: String,
    pub http_timeout: Duration,
}

pub struct ProtecodeClient {
    http: reqwest::blocking::Client,
    base_url: String,
    user: String,
    password: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductList {
    #[serde(default)]
    products: Vec<ProductEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductEntry {
    product_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ResultEnvelope {
    results: ScanResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub product_id: i64,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub vulns: Vec<VulnEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VulnEntry {
    #[serde(default)]
    pub exact: bool,
    #[serde(default)]
    pub triage: Vec<Triage>,
    pub vuln: VulnDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Triage {
    #[serde(default)]
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VulnDetail {
    #[serde(default)]
    pub cve: String,
    #[serde(default)]
    pub cvss: f64,
    #[serde(default)]
    pub cvss3_score: String,
}

impl ProtecodeClient {
    pub fn new(opts: ProtecodeOptions) -> Result<Self> {
        let base_url = opts.server_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(crate::exit::invalid_args(
                "protecode: server_url が設定されていません",
            ));
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(opts.http_timeout)
            .build()
            .context("HTTPクライアントの構築に失敗しました")?;

        Ok(Self {
            http,
            base_url,
            user: opts.user,
            password: opts.password,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::blocking::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .basic_auth(&self.user, Some(&self.password))
    }

    pub fn load_existing_product(&self, group: &str, file_name: &str) -> Result<Option<i64>> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/api/apps/{group}/?q=file:{file_name}"),
            )
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("既存プロダクトの照会に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "既存プロダクトの照会")?;

        let list: ProductList = resp
            .json()
            .context("既存プロダクト応答(JSON)の解析に失敗しました")?;
        Ok(list.products.first().map(|p| p.product_id))
    }

    pub fn upload_file(&self, group: &str, path: &Path, delete_binary: bool) -> Result<ScanResult> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("ファイル名を取得できませんでした: {}", path.display()))?;
        let file = std::fs::File::open(path)
            .with_context(|| format!("スキャン対象を開けませんでした: {}", path.display()))?;

        let resp = self
            .request(reqwest::Method::PUT, &format!("/api/upload/{file_name}"))
            .header("Group", group)
            .header("Delete-Binary", if delete_binary { "true" } else { "false" })
            .body(file)
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("アップロードに失敗しました"),
                )
            })?;
        let resp = check_status(resp, "アップロード")?;

        let envelope: ResultEnvelope = resp
            .json()
            .context("アップロード応答(JSON)の解析に失敗しました")?;
        Ok(envelope.results)
    }

    pub fn declare_fetch_url(
        &self,
        group: &str,
        url: &str,
        delete_binary: bool,
    ) -> Result<ScanResult> {
        let resp = self
            .request(reqwest::Method::POST, "/api/fetch/")
            .header("Group", group)
            .header("Delete-Binary", if delete_binary { "true" } else { "false" })
            .header("Url", url)
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("フェッチ宣言に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "フェッチ宣言")?;

        let envelope: ResultEnvelope = resp
            .json()
            .context("フェッチ宣言応答(JSON)の解析に失敗しました")?;
        Ok(envelope.results)
    }

    pub fn fetch_product(&self, product_id: i64) -> Result<ScanResult> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/api/product/{product_id}/"))
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("スキャン状態の取得に失敗しました"),
                )
            })?;
        let resp = check_status(resp, "スキャン状態の取得")?;

        let envelope: ResultEnvelope = resp
            .json()
            .context("スキャン状態応答(JSON)の解析に失敗しました")?;
        Ok(envelope.results)
    }

    pub fn poll_for_result(
        &self,
        product_id: i64,
        poll_interval: Duration,
        deadline: Instant,
        progress: Option<&indicatif::ProgressBar>,
    ) -> Result<ScanResult> {
        let started = Instant::now();
        loop {
            let result = self.fetch_product(product_id)?;
            let status = result.status.unwrap_or(ProductStatus::Busy);

            if let Some(pb) = progress {
                pb.set_message(format!(
                    "スキャン待機中 product_id={product_id} status={status} 経過={}s",
                    started.elapsed().as_secs()
                ));
            }

            if status.is_done() {
                return Ok(result);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(anyhow!(
                    "スキャンがタイムアウトしました（product_id={product_id}、経過={}s）",
                    started.elapsed().as_secs()
                ));
            }

            let remaining = deadline.saturating_duration_since(now);
            std::thread::sleep(std::cmp::min(poll_interval, remaining));
        }
    }

    pub fn load_report(&self, product_id: i64) -> Result<Vec<u8>> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/api/product/{product_id}/pdf-report"),
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

    pub fn delete_scan(&self, cleanup_mode: CleanupMode, product_id: i64) -> Result<()> {
        if !cleanup_mode.delete_product() {
            return Ok(());
        }

        let resp = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/product/{product_id}/"),
            )
            .send()
            .map_err(|e| {
                crate::exit::backend_unreachable_err(
                    anyhow::Error::new(e).context("スキャンの削除に失敗しました"),
                )
            })?;
        check_status(resp, "スキャンの削除")?;
        Ok(())
    }
}

pub fn parse_counts(result: &ScanResult, exclude_cves: &[String]) -> VulnCounts {
    let mut counts = VulnCounts::default();

    for component in &result.components {
        for entry in &component.vulns {
            if !entry.exact {
                counts.historical += 1;
                continue;
            }

            let triaged = !entry.triage.is_empty();
            let excluded = exclude_cves.iter().any(|cve| *cve == entry.vuln.cve);
            if triaged {
                counts.triaged += 1;
            }
            if excluded {
                counts.excluded += 1;
            }
            if triaged || excluded {
                continue;
            }

            counts.count += 1;
            counts.vulnerabilities += 1;
            if entry.vuln.cvss >= 7.0 {
                counts.cvss2_ge_seven += 1;
                counts.major += 1;
            } else if cvss3_score(&entry.vuln) >= 7.0 {
                counts.cvss3_ge_seven += 1;
                counts.major += 1;
            } else {
                counts.minor += 1;
            }
        }
    }

    counts
}

fn cvss3_score(vuln: &VulnDetail) -> f64 {
    vuln.cvss3_score.trim().parse::<f64>().unwrap_or(0.0)
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

    fn vuln(exact: bool, triaged: bool, cve: &str, cvss: f64, cvss3: &str) -> VulnEntry {
        VulnEntry {
            exact,
            triage: if triaged { vec![Triage { id: 1 }] } else { vec![] },
            vuln: VulnDetail {
                cve: cve.to_string(),
                cvss,
                cvss3_score: cvss3.to_string(),
            },
        }
    }

    fn result_with(vulns: Vec<VulnEntry>) -> ScanResult {
        ScanResult {
            product_id: 4711,
            status: Some(ProductStatus::Ready),
            components: vec![Component { vulns }],
        }
    }

    #[test]
    fn non_exact_matches_are_historical_only() {
        let result = result_with(vec![vuln(false, false, "CVE-2024-0001", 9.8, "9.8")]);
        let counts = parse_counts(&result, &[]);
        assert_eq!(counts.historical, 1);
        assert_eq!(counts.count, 0);
        assert_eq!(counts.major, 0);
    }

    #[test]
    fn triaged_and_excluded_are_not_counted() {
        let exclude = vec!["CVE-2024-0002".to_string()];
        let result = result_with(vec![
            vuln(true, true, "CVE-2024-0001", 9.8, "9.8"),
            vuln(true, false, "CVE-2024-0002", 8.0, "8.0"),
        ]);
        let counts = parse_counts(&result, &exclude);
        assert_eq!(counts.triaged, 1);
        assert_eq!(counts.excluded, 1);
        assert_eq!(counts.count, 0);
        assert_eq!(counts.vulnerabilities, 0);
    }

    #[test]
    fn triaged_and_excluded_increment_independently() {
        let exclude = vec!["CVE-2024-0003".to_string()];
        let result = result_with(vec![vuln(true, true, "CVE-2024-0003", 5.0, "5.0")]);
        let counts = parse_counts(&result, &exclude);
        assert_eq!(counts.triaged, 1);
        assert_eq!(counts.excluded, 1);
        assert_eq!(counts.count, 0);
    }

    #[test]
    fn severity_buckets_prefer_cvss2() {
        let result = result_with(vec![
            vuln(true, false, "CVE-2024-0010", 7.0, "9.8"),
            vuln(true, false, "CVE-2024-0011", 3.0, "7.5"),
            vuln(true, false, "CVE-2024-0012", 3.0, "4.0"),
        ]);
        let counts = parse_counts(&result, &[]);
        assert_eq!(counts.cvss2_ge_seven, 1);
        assert_eq!(counts.cvss3_ge_seven, 1);
        assert_eq!(counts.major, 2);
        assert_eq!(counts.minor, 1);
        assert_eq!(counts.count, 3);
        assert_eq!(counts.severe(), 2);
    }

    #[test]
    fn unparseable_cvss3_counts_as_minor() {
        let result = result_with(vec![vuln(true, false, "CVE-2024-0020", 1.0, "n/a")]);
        let counts = parse_counts(&result, &[]);
        assert_eq!(counts.minor, 1);
        assert_eq!(counts.cvss3_ge_seven, 0);
    }
}
