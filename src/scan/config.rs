use crate::error::ScanError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Drive,
    Local,
}

impl Backend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "drive" | "gdrive" => Some(Self::Drive),
            "local" | "fs" => Some(Self::Local),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub backend: Backend,
    pub credentials: Option<String>,
    pub root_folder_id: Option<String>,
    pub api_base: String,
    pub token_command: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Drive,
            credentials: None,
            root_folder_id: None,
            api_base: crate::storage::drive::DEFAULT_API_BASE.to_string(),
            token_command: None,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanLimitsConfig {
    pub max_items: usize,
    pub max_depth: usize,
    pub name_filter: String,
    pub max_pages: usize,
    pub keep_downloads: bool,
    pub pdftotext_bin: Option<PathBuf>,
    pub extract_timeout_secs: u64,
}

impl Default for ScanLimitsConfig {
    fn default() -> Self {
        Self {
            max_items: 300,
            max_depth: 10,
            name_filter: "tasy".to_string(),
            max_pages: 2,
            keep_downloads: true,
            pdftotext_bin: None,
            extract_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LaudoConfig {
    pub drive: DriveConfig,
    pub scan: ScanLimitsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialLaudoConfig {
    drive: Option<DriveConfig>,
    scan: Option<ScanLimitsConfig>,
    output: Option<OutputConfig>,
}

impl LaudoConfig {
    /// An empty filter means "no filter".
    pub fn name_filter(&self) -> Option<&str> {
        let trimmed = self.scan.name_filter.trim();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    }

    pub fn require_root(&self) -> Result<&str, ScanError> {
        non_empty(self.drive.root_folder_id.as_deref()).ok_or_else(|| {
            ScanError::ConfigMissing(
                "root folder id (LAUDO_ROOT_FOLDER_ID or GDRIVE_ROOT_FOLDER_ID)".to_string(),
            )
        })
    }

    pub fn require_credentials(&self) -> Result<&str, ScanError> {
        non_empty(self.drive.credentials.as_deref()).ok_or_else(|| {
            ScanError::ConfigMissing(
                "credentials (LAUDO_CREDENTIALS or GDRIVE_SA_JSON)".to_string(),
            )
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn env_first(vars: &[&str]) -> Option<String> {
    vars.iter().find_map(|var| match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    })
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

pub fn validate(cfg: &LaudoConfig) -> Result<()> {
    if cfg.scan.max_items == 0 {
        return Err(ScanError::InvalidConfig("max items must be >= 1".to_string()).into());
    }
    if cfg.scan.max_pages == 0 {
        return Err(ScanError::InvalidConfig("max pages must be >= 1".to_string()).into());
    }
    if cfg.drive.request_timeout_secs == 0 || cfg.scan.extract_timeout_secs == 0 {
        return Err(ScanError::InvalidConfig("timeouts must be >= 1 second".to_string()).into());
    }
    if cfg.drive.api_base.trim().is_empty() {
        return Err(ScanError::InvalidConfig("drive api base cannot be empty".to_string()).into());
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Some(custom) = env_first(&["LAUDO_CONFIG_PATH"]) {
        return Some(PathBuf::from(custom));
    }

    let home = dirs::home_dir()?;
    Some(home.join(".laudo").join("laudo.toml"))
}

pub fn parse_file_config(raw: &str, base: &mut LaudoConfig) -> Result<()> {
    let parsed: PartialLaudoConfig = toml::from_str(raw)?;
    if let Some(drive) = parsed.drive {
        base.drive = drive;
    }
    if let Some(scan) = parsed.scan {
        base.scan = scan;
    }
    if let Some(output) = parsed.output {
        base.output = output;
    }
    Ok(())
}

fn merge_file_config(base: &mut LaudoConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    parse_file_config(&raw, base).map_err(|err| {
        anyhow!(ScanError::InvalidConfig(format!(
            "failed to parse {}: {err}",
            path.display()
        )))
    })
}

fn merge_env(cfg: &mut LaudoConfig) -> Result<()> {
    if let Some(raw) = env_first(&["LAUDO_BACKEND"]) {
        cfg.drive.backend = Backend::parse(&raw).ok_or_else(|| {
            anyhow!(ScanError::InvalidConfig(format!(
                "unknown backend `{raw}`: use `drive` or `local`"
            )))
        })?;
    }
    if let Some(v) = env_first(&["LAUDO_CREDENTIALS", "GDRIVE_SA_JSON"]) {
        cfg.drive.credentials = Some(v);
    }
    if let Some(v) = env_first(&["LAUDO_ROOT_FOLDER_ID", "GDRIVE_ROOT_FOLDER_ID"]) {
        cfg.drive.root_folder_id = Some(v);
    }
    if let Some(v) = env_first(&["LAUDO_DRIVE_API_BASE"]) {
        cfg.drive.api_base = v;
    }
    if let Some(v) = env_first(&["LAUDO_TOKEN_COMMAND"]) {
        cfg.drive.token_command = Some(v);
    }
    cfg.drive.request_timeout_secs =
        env_or_u64("LAUDO_REQUEST_TIMEOUT_SECS", cfg.drive.request_timeout_secs);

    cfg.scan.max_items = env_or_usize("LAUDO_MAX_ITEMS", cfg.scan.max_items);
    cfg.scan.max_depth = env_or_usize("LAUDO_MAX_DEPTH", cfg.scan.max_depth);
    cfg.scan.max_pages = env_or_usize("LAUDO_MAX_PAGES", cfg.scan.max_pages);
    // Set-but-empty clears the filter.
    if let Ok(v) = env::var("LAUDO_NAME_FILTER") {
        cfg.scan.name_filter = v.trim().to_string();
    }
    cfg.scan.keep_downloads = env_or_bool("LAUDO_KEEP_DOWNLOADS", cfg.scan.keep_downloads);
    if let Some(v) = env_first(&["LAUDO_PDFTOTEXT_BIN"]) {
        cfg.scan.pdftotext_bin = Some(PathBuf::from(v));
    }
    cfg.scan.extract_timeout_secs =
        env_or_u64("LAUDO_EXTRACT_TIMEOUT_SECS", cfg.scan.extract_timeout_secs);

    if let Some(v) = env_first(&["LAUDO_OUTPUT_DIR"]) {
        cfg.output.dir = PathBuf::from(v);
    }
    Ok(())
}

/// Defaults, then the TOML file, then environment. Callers apply CLI flags
/// on top and call [`validate`] again.
pub fn load_config() -> Result<LaudoConfig> {
    let mut cfg = LaudoConfig::default();
    merge_file_config(&mut cfg)?;
    merge_env(&mut cfg)?;
    validate(&cfg)?;
    Ok(cfg)
}
