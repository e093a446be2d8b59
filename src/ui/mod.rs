use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{ScanReport, SeverityCounts, VulnCounts};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "エラー:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "原因:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "次に:");
    let _ = writeln!(
        stderr,
        "  - 詳細を見るには `--verbose` を付けて再実行してください"
    );
    let _ = writeln!(
        stderr,
        "  - 利用可能なコマンド/オプションは `scangate --help` を参照してください"
    );
}

pub fn print_scan_summary(report: &ScanReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "概要: backend={}  status={}  対象={}",
        report.backend, report.status, report.target
    );
    if let Some(product_id) = report.product_id {
        let _ = writeln!(out, "- product_id={product_id}");
    }
    for note in &report.notes {
        let _ = writeln!(out, "- {note}");
    }
    if cfg.verbose {
        let _ = writeln!(out, "- 生成時刻: {}", report.generated_at);
    }

    if let Some(counts) = &report.vuln_counts {
        let _ = writeln!(out);
        print_vuln_counts_table(&mut out, counts, cfg.color);
    }
    if let Some(counts) = &report.severity_counts {
        let _ = writeln!(out);
        print_severity_counts_table(&mut out, counts, cfg.color);
    }
}

fn print_vuln_counts_table(out: &mut dyn Write, counts: &VulnCounts, color: bool) {
    let severe = counts.severe() > 0;
    let rows: Vec<(&str, String, bool)> = vec![
        ("検出数", counts.count.to_string(), false),
        (
            "cvss2>=7",
            counts.cvss2_ge_seven.to_string(),
            severe && counts.cvss2_ge_seven > 0,
        ),
        (
            "cvss3>=7",
            counts.cvss3_ge_seven.to_string(),
            severe && counts.cvss3_ge_seven > 0,
        ),
        ("major", counts.major.to_string(), false),
        ("minor", counts.minor.to_string(), false),
        ("トリアージ済み", counts.triaged.to_string(), false),
        ("除外", counts.excluded.to_string(), false),
        ("過去バージョン", counts.historical.to_string(), false),
    ];
    print_counts_table(out, &rows, color);
}

fn print_severity_counts_table(out: &mut dyn Write, counts: &SeverityCounts, color: bool) {
    let rows: Vec<(&str, String, bool)> = vec![
        ("high", counts.high.to_string(), counts.high > 0),
        ("medium", counts.medium.to_string(), false),
        ("low", counts.low.to_string(), false),
        ("info", counts.info.to_string(), false),
    ];
    print_counts_table(out, &rows, color);
}

fn print_counts_table(out: &mut dyn Write, rows: &[(&str, String, bool)], color: bool) {
    let label_name = "項目";
    let label_count = "件数";

    let name_w = rows
        .iter()
        .map(|(name, _, _)| visible_width_ansi(name))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_name));
    let count_w = rows
        .iter()
        .map(|(_, count, _)| visible_width_ansi(count))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_count));

    let _ = writeln!(
        out,
        "{}  {}",
        pad_end_display(label_name, name_w),
        pad_start_display(label_count, count_w)
    );
    let _ = writeln!(out, "{}  {}", "-".repeat(name_w), "-".repeat(count_w));

    for (name, count, highlight) in rows {
        let count = if color && *highlight {
            format!("\x1b[31m{count}\x1b[0m")
        } else {
            count.clone()
        };
        let _ = writeln!(
            out,
            "{}  {}",
            pad_end_display(name, name_w),
            pad_start_ansi(&count, count_w)
        );
    }
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn pad_start_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.peek() == Some(&'[') {
                let _ = chars.next();
                for ch2 in chars.by_ref() {
                    if ch2 == 'm' {
                        break;
                    }
                }
                continue;
            }
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_width_ignores_ansi_sequences() {
        assert_eq!(visible_width_ansi("\x1b[31m12\x1b[0m"), 2);
        assert_eq!(visible_width_ansi("件数"), 4);
    }

    #[test]
    fn pad_helpers_align_to_width() {
        assert_eq!(pad_end_display("ab", 4), "ab  ");
        assert_eq!(pad_start_display("ab", 4), "  ab");
        assert_eq!(pad_start_ansi("\x1b[31m1\x1b[0m", 3), "  \x1b[31m1\x1b[0m");
    }
}
