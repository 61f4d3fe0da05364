use crate::error::{CapabilityError, ErrorKind};
use crate::scan::util::run_command_with_optional_timeout;
use crate::storage::TextExtractor;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Text extraction through poppler's `pdftotext`, limited to the first pages.
#[derive(Debug, Clone)]
pub struct PdfToText {
    bin: PathBuf,
    timeout_secs: u64,
}

pub fn resolve_pdftotext_bin(configured: Option<&Path>) -> Result<PathBuf, CapabilityError> {
    if let Some(bin) = configured {
        if bin.is_file() {
            return Ok(bin.to_path_buf());
        }
        return Err(CapabilityError::new(
            ErrorKind::ToolMissing,
            format!("pdftotext binary does not exist: {}", bin.display()),
        ));
    }
    which::which("pdftotext").map_err(|err| {
        CapabilityError::new(
            ErrorKind::ToolMissing,
            format!("pdftotext not found in LAUDO_PDFTOTEXT_BIN or PATH: {err}"),
        )
    })
}

impl PdfToText {
    pub fn new(configured: Option<&Path>, timeout_secs: u64) -> Result<Self, CapabilityError> {
        Ok(Self {
            bin: resolve_pdftotext_bin(configured)?,
            timeout_secs,
        })
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }
}

impl TextExtractor for PdfToText {
    fn extract_text(&self, path: &Path, max_pages: usize) -> Result<String, CapabilityError> {
        let out_path = path.with_extension("txt");
        let last_page = max_pages.max(1).to_string();
        let mut cmd = Command::new(&self.bin);
        cmd.args(["-f", "1", "-l", &last_page, "-enc", "UTF-8"])
            .arg(path)
            .arg(&out_path);

        let output = run_command_with_optional_timeout(&mut cmd, Some(self.timeout_secs))
            .map_err(|err| {
                let message = format!("{err:#}");
                let kind = if message.contains("timed out") {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::ToolFailed
                };
                CapabilityError::new(kind, message)
            })?;

        if !output.status.success() {
            let _ = fs::remove_file(&out_path);
            return Err(CapabilityError::new(
                ErrorKind::ToolFailed,
                format!(
                    "pdftotext exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let raw = fs::read(&out_path)?;
        let _ = fs::remove_file(&out_path);
        // Page breaks come out as form feeds.
        Ok(String::from_utf8_lossy(&raw).replace('\u{c}', "\n"))
    }
}
