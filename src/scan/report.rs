use crate::scan::reconcile::{FailureRecord, ResultRecord, ScanOutcome};
use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const RESULT_HEADERS: [&str; 5] = [
    "identifier",
    "final_date",
    "year_label",
    "path_hint",
    "reason_code",
];
pub const FAILURE_HEADERS: [&str; 4] = ["identifier", "year_label", "path_hint", "reason_code"];

const RESULTS_FILE: &str = "results.csv";
const FAILURES_FILE: &str = "failures.csv";

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub results: PathBuf,
    pub failures: PathBuf,
}

/// Numeric identifiers in numeric order, then anything else lexicographically.
pub fn compare_identifiers(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    match (numeric(a), numeric(b)) {
        (true, true) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

pub fn sorted_results(results: &BTreeMap<String, ResultRecord>) -> Vec<(&String, &ResultRecord)> {
    let mut rows: Vec<_> = results.iter().collect();
    rows.sort_by(|(a, _), (b, _)| compare_identifiers(a, b));
    rows
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

pub fn render_results_sheet(results: &BTreeMap<String, ResultRecord>) -> String {
    let mut out = csv_line(&RESULT_HEADERS);
    for (identifier, record) in sorted_results(results) {
        let date = record.date.date.format("%Y-%m-%d").to_string();
        out.push_str(&csv_line(&[
            identifier.as_str(),
            date.as_str(),
            record.year_label.as_str(),
            record.path_hint.as_str(),
            record.date.reason.as_str(),
        ]));
    }
    out
}

pub fn render_failures_sheet(failures: &[FailureRecord]) -> String {
    let mut out = csv_line(&FAILURE_HEADERS);
    for failure in failures {
        let reason = failure.reason.code();
        out.push_str(&csv_line(&[
            failure.identifier.as_str(),
            failure.year_label.as_str(),
            failure.path_hint.as_str(),
            reason.as_str(),
        ]));
    }
    out
}

pub fn write_report(output_dir: &Path, outcome: &ScanOutcome) -> Result<ReportPaths> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let paths = ReportPaths {
        results: output_dir.join(RESULTS_FILE),
        failures: output_dir.join(FAILURES_FILE),
    };
    fs::write(&paths.results, render_results_sheet(&outcome.results))
        .with_context(|| format!("failed to write {}", paths.results.display()))?;
    fs::write(&paths.failures, render_failures_sheet(&outcome.failures))
        .with_context(|| format!("failed to write {}", paths.failures.display()))?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::scan::date_picker::{DateCandidate, ReasonCode};
    use crate::scan::reconcile::FailureReason;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn record(path: &str) -> ResultRecord {
        ResultRecord {
            date: DateCandidate {
                date: NaiveDate::from_ymd_opt(2025, 1, 5).expect("date"),
                reason: ReasonCode::HeaderDate,
            },
            year_label: "2025".to_string(),
            path_hint: path.to_string(),
        }
    }

    #[test]
    fn numeric_identifiers_sort_numerically_before_others() {
        let mut ids = vec!["100", "abc", "20", "3", "0"];
        ids.sort_by(|a, b| compare_identifiers(a, b));
        assert_eq!(ids, vec!["0", "3", "20", "100", "abc"]);
    }

    #[test]
    fn results_sheet_has_fixed_headers_and_iso_dates() {
        let mut results = BTreeMap::new();
        results.insert("100".to_string(), record("2025/b.pdf"));
        results.insert("9".to_string(), record("2025/a, \"x\".pdf"));

        let sheet = render_results_sheet(&results);
        let lines: Vec<&str> = sheet.split("\r\n").collect();
        assert_eq!(lines[0], "identifier,final_date,year_label,path_hint,reason_code");
        assert_eq!(lines[1], "9,2025-01-05,2025,\"2025/a, \"\"x\"\".pdf\",HEADER_DATE");
        assert_eq!(lines[2], "100,2025-01-05,2025,2025/b.pdf,HEADER_DATE");
    }

    #[test]
    fn failures_sheet_keeps_append_order_and_duplicates() {
        let failure = |id: &str, reason| FailureRecord {
            identifier: id.to_string(),
            year_label: "2024".to_string(),
            path_hint: "2024/x.pdf".to_string(),
            reason,
        };
        let failures = vec![
            failure("9", FailureReason::DownloadFailed(ErrorKind::Timeout)),
            failure("1", FailureReason::NoDateFound(ReasonCode::NoDate)),
            failure("9", FailureReason::DownloadFailed(ErrorKind::Timeout)),
        ];
        let sheet = render_failures_sheet(&failures);
        assert_eq!(
            sheet,
            "identifier,year_label,path_hint,reason_code\r\n\
             9,2024,2024/x.pdf,DOWNLOAD_FAILED:timeout\r\n\
             1,2024,2024/x.pdf,NO_DATE\r\n\
             9,2024,2024/x.pdf,DOWNLOAD_FAILED:timeout\r\n"
        );
    }

    #[test]
    fn write_report_is_deterministic() {
        let tmp = tempdir().expect("tempdir");
        let mut outcome = ScanOutcome::default();
        outcome.results.insert("5".to_string(), record("2025/a.pdf"));

        let first = write_report(tmp.path(), &outcome).expect("write");
        let a = fs::read(&first.results).expect("read");
        let second = write_report(tmp.path(), &outcome).expect("write");
        let b = fs::read(&second.results).expect("read");
        assert_eq!(a, b);
        assert!(second.failures.exists());
    }
}
