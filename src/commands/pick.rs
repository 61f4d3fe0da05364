use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::scan::config::{LaudoConfig, load_config};
use crate::scan::date_picker::pick_date;
use crate::scan::identifier::extract_identifier;
use crate::storage::TextExtractor;
use crate::storage::pdftotext::PdfToText;

#[derive(Debug, Clone)]
pub struct PickOptions {
    pub pdf: PathBuf,
    pub name: Option<String>,
}

fn display_name(opts: &PickOptions) -> String {
    if let Some(name) = opts.name.as_deref().map(str::trim)
        && !name.is_empty()
    {
        return name.to_string();
    }
    opts.pdf
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn pick_file(
    cfg: &LaudoConfig,
    extractor: &dyn TextExtractor,
    opts: &PickOptions,
) -> Result<CommandReport> {
    if !opts.pdf.is_file() {
        bail!("pdf not found: {}", opts.pdf.display());
    }
    let name = display_name(opts);

    // Extract from a private copy so the sidecar text file never lands next to the input.
    let work_dir = tempfile::tempdir().context("failed to create work dir")?;
    let copy = work_dir.path().join("input.pdf");
    fs::copy(&opts.pdf, &copy)
        .with_context(|| format!("failed to copy {}", opts.pdf.display()))?;

    let mut report = CommandReport::new("pick");
    report.detail(format!("name={name}"));
    report.detail(format!(
        "identifier={}",
        extract_identifier(&name).unwrap_or_default()
    ));

    match extractor.extract_text(&copy, cfg.scan.max_pages) {
        Ok(text) => {
            let outcome = pick_date(&text, &name);
            report.detail(format!(
                "date={}",
                outcome
                    .date()
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            ));
            report.detail(format!("reason={}", outcome.reason().as_str()));
            if outcome.date().is_none() {
                report.issue(format!("no date resolved ({})", outcome.reason().as_str()));
            }
        }
        Err(err) => report.issue(format!("extraction failed: {err}")),
    }
    Ok(report)
}

pub fn run(opts: &PickOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let extractor = PdfToText::new(cfg.scan.pdftotext_bin.as_deref(), cfg.scan.extract_timeout_secs)
        .map_err(|err| anyhow::anyhow!("pdftotext unavailable: {err}"))?;
    let mut report = pick_file(&cfg, &extractor, opts)?;
    report.detail(format!("pdftotext={}", extractor.bin().display()));
    Ok(report)
}
