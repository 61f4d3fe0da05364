use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::scan::config::{Backend, LaudoConfig, load_config};
use crate::storage::credentials::{Credentials, parse_credentials};
use crate::storage::pdftotext::resolve_pdftotext_bin;

include!(concat!(env!("OUT_DIR"), "/laudo_env_allowlist.rs"));

const LEGACY_ENV_KEYS: [&str; 2] = ["GDRIVE_SA_JSON", "GDRIVE_ROOT_FOLDER_ID"];

pub fn env_keys_set() -> Vec<&'static str> {
    GENERATED_LAUDO_ENV_ALLOWLIST
        .iter()
        .chain(LEGACY_ENV_KEYS.iter())
        .copied()
        .filter(|key| env::var_os(key).is_some())
        .collect()
}

fn describe_credentials(raw: &str) -> String {
    match parse_credentials(raw) {
        Ok(Credentials::AccessToken(_)) => "access_token".to_string(),
        Ok(Credentials::ServiceAccount { client_email, .. }) => {
            format!("service_account({client_email})")
        }
        Err(err) => format!("invalid({})", err.kind),
    }
}

pub fn collect(cfg: &LaudoConfig, report: &mut CommandReport) {
    report.detail(format!("build_id={}", env!("BUILD_UUID")));
    report.detail(format!("backend={}", cfg.drive.backend.label()));
    report.detail(format!(
        "root={}",
        cfg.drive.root_folder_id.as_deref().unwrap_or("")
    ));
    report.detail(format!("max_items={}", cfg.scan.max_items));
    report.detail(format!("max_depth={}", cfg.scan.max_depth));
    report.detail(format!("max_pages={}", cfg.scan.max_pages));
    report.detail(format!("name_filter={}", cfg.name_filter().unwrap_or("")));
    report.detail(format!("keep_downloads={}", cfg.scan.keep_downloads));
    report.detail(format!("output_dir={}", cfg.output.dir.display()));
    report.detail(format!("env_keys_set={}", env_keys_set().join(",")));

    if cfg.require_root().is_err() {
        report.issue("root folder id is not set (LAUDO_ROOT_FOLDER_ID)");
    }

    if cfg.drive.backend == Backend::Drive {
        report.detail(format!("drive_api_base={}", cfg.drive.api_base));
        match cfg.require_credentials() {
            Ok(raw) => {
                let kind = describe_credentials(raw);
                if kind.starts_with("invalid") {
                    report.issue(format!("credentials are {kind}"));
                }
                if kind.starts_with("service_account") && cfg.drive.token_command.is_none() {
                    report.issue("service-account credentials need LAUDO_TOKEN_COMMAND");
                }
                report.detail(format!("credentials={kind}"));
            }
            Err(_) => report.issue("credentials are not set (LAUDO_CREDENTIALS)"),
        }
    }

    match resolve_pdftotext_bin(cfg.scan.pdftotext_bin.as_deref()) {
        Ok(bin) => report.detail(format!("pdftotext={}", bin.display())),
        Err(err) => report.issue(err.message),
    }
}

pub fn run() -> Result<CommandReport> {
    let cfg = load_config()?;
    let mut report = CommandReport::new("status");
    collect(&cfg, &mut report);
    Ok(report)
}
