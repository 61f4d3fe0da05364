use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::error::ScanError;
use crate::scan::audit;
use crate::scan::config::{Backend, LaudoConfig, load_config, validate};
use crate::scan::reconcile::{ReconcileOptions, Reconciler};
use crate::scan::report::write_report;
use crate::scan::warn;
use crate::storage::credentials::{parse_credentials, resolve_access_token};
use crate::storage::drive::DriveStore;
use crate::storage::local::LocalStore;
use crate::storage::pdftotext::PdfToText;
use crate::storage::RemoteStore;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub root: Option<String>,
    pub backend: Option<Backend>,
    pub max_items: Option<usize>,
    pub max_depth: Option<usize>,
    pub filter: Option<String>,
    pub output_dir: Option<PathBuf>,
}

pub fn apply_overrides(cfg: &mut LaudoConfig, opts: &ScanOptions) {
    if let Some(root) = &opts.root {
        cfg.drive.root_folder_id = Some(root.clone());
    }
    if let Some(backend) = opts.backend {
        cfg.drive.backend = backend;
    }
    if let Some(max_items) = opts.max_items {
        cfg.scan.max_items = max_items;
    }
    if let Some(max_depth) = opts.max_depth {
        cfg.scan.max_depth = max_depth;
    }
    if let Some(filter) = &opts.filter {
        cfg.scan.name_filter = filter.trim().to_string();
    }
    if let Some(dir) = &opts.output_dir {
        cfg.output.dir = dir.clone();
    }
}

fn open_store(cfg: &LaudoConfig, root: &str) -> Result<Box<dyn RemoteStore>, ScanError> {
    match cfg.drive.backend {
        Backend::Local => Ok(Box::new(LocalStore)),
        Backend::Drive => {
            let blob = cfg.require_credentials()?;
            let creds = parse_credentials(blob)
                .map_err(|err| ScanError::InvalidConfig(format!("credentials: {err}")))?;
            let into_root_err = |source| ScanError::RootInaccessible {
                root: root.to_string(),
                source,
            };
            let token = resolve_access_token(
                &creds,
                cfg.drive.token_command.as_deref(),
                cfg.drive.request_timeout_secs,
            )
            .map_err(into_root_err)?;
            let store = DriveStore::new(&cfg.drive.api_base, token, cfg.drive.request_timeout_secs)
                .map_err(into_root_err)?;
            Ok(Box::new(store))
        }
    }
}

fn run_scan(cfg: &LaudoConfig, report: &mut CommandReport) -> Result<(), ScanError> {
    let root = cfg.require_root()?;
    let extractor = PdfToText::new(
        cfg.scan.pdftotext_bin.as_deref(),
        cfg.scan.extract_timeout_secs,
    )
    .map_err(|err| ScanError::ConfigMissing(format!("pdftotext binary ({err})")))?;
    let store = open_store(cfg, root)?;

    // Dropping the guard removes every downloaded file, on error paths too.
    let work_dir = tempfile::Builder::new()
        .prefix("laudo-scan-")
        .tempdir()
        .map_err(ScanError::WorkDirUnavailable)?;

    let options = ReconcileOptions {
        max_items: cfg.scan.max_items,
        max_depth: cfg.scan.max_depth,
        max_pages: cfg.scan.max_pages,
        name_filter: cfg.name_filter(),
        keep_downloads: cfg.scan.keep_downloads,
    };
    let outcome = Reconciler::new(store.as_ref(), &extractor, options, work_dir.path()).run(root)?;

    let paths = write_report(&cfg.output.dir, &outcome)
        .map_err(|err| ScanError::ReportWriteFailed(format!("{err:#}")))?;

    report.detail(format!("years={}", outcome.years.join(",")));
    report.detail(format!("processed={}", outcome.processed));
    report.detail(format!("cap_reached={}", outcome.cap_reached));
    report.detail(format!("results_path={}", paths.results.display()));
    report.detail(format!("failures_path={}", paths.failures.display()));
    report.detail(format!(
        "summary: results={} failures={} years={}",
        outcome.results.len(),
        outcome.failures.len(),
        outcome.years.len()
    ));
    Ok(())
}

pub fn run(opts: &ScanOptions) -> Result<CommandReport> {
    let mut cfg = load_config()?;
    apply_overrides(&mut cfg, opts);
    validate(&cfg)?;

    let mut report = CommandReport::new("scan");
    report.detail(format!("backend={}", cfg.drive.backend.label()));
    report.detail(format!(
        "root={}",
        cfg.drive.root_folder_id.as_deref().unwrap_or("")
    ));
    report.detail(format!("max_items={}", cfg.scan.max_items));
    report.detail(format!("max_depth={}", cfg.scan.max_depth));
    report.detail(format!("name_filter={}", cfg.name_filter().unwrap_or("")));

    let output_dir = cfg.output.dir.clone();
    let root_label = cfg.drive.root_folder_id.clone().unwrap_or_default();
    let _ = audit::append_event(&output_dir, "scan", "started", &format!("root={root_label}"));

    if let Err(err) = run_scan(&cfg, &mut report) {
        warn::emit(err.code(), "scan", &root_label, "", "fatal", &err.to_string());
        let _ = audit::append_event(&output_dir, "scan", "failed", &err.to_string());
        return Err(err.into());
    }

    let summary = report.details.last().cloned().unwrap_or_default();
    let _ = audit::append_event(&output_dir, "scan", "ok", &summary);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let mut cfg = LaudoConfig::default();
        let opts = ScanOptions {
            root: Some("abc".to_string()),
            backend: Some(Backend::Local),
            max_items: Some(7),
            max_depth: Some(2),
            filter: Some(" ".to_string()),
            output_dir: Some(PathBuf::from("/tmp/out")),
        };
        apply_overrides(&mut cfg, &opts);
        assert_eq!(cfg.drive.root_folder_id.as_deref(), Some("abc"));
        assert_eq!(cfg.drive.backend, Backend::Local);
        assert_eq!(cfg.scan.max_items, 7);
        assert_eq!(cfg.scan.max_depth, 2);
        assert_eq!(cfg.name_filter(), None);
        assert_eq!(cfg.output.dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn drive_backend_without_credentials_is_config_missing() {
        let mut cfg = LaudoConfig::default();
        cfg.drive.root_folder_id = Some("abc".to_string());
        let err = open_store(&cfg, "abc").err().expect("should fail");
        assert_eq!(err.code(), "CONFIG_MISSING");
    }
}
