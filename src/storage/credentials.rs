use crate::error::{CapabilityError, ErrorKind};
use crate::scan::util::run_command_with_optional_timeout;
use serde_json::Value;
use std::io::Write;
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    ServiceAccount { client_email: String, raw: String },
}

/// Accepts `{"access_token": ...}`, a service-account key, or a bare token.
pub fn parse_credentials(blob: &str) -> Result<Credentials, CapabilityError> {
    let trimmed = blob.trim();
    if trimmed.is_empty() {
        return Err(CapabilityError::new(ErrorKind::Auth, "credentials are empty"));
    }

    if !trimmed.starts_with('{') {
        return Ok(Credentials::AccessToken(trimmed.to_string()));
    }

    let parsed: Value = serde_json::from_str(trimmed).map_err(|err| {
        CapabilityError::new(ErrorKind::Auth, format!("credentials are not valid JSON: {err}"))
    })?;

    if let Some(token) = parsed.get("access_token").and_then(Value::as_str)
        && !token.trim().is_empty()
    {
        return Ok(Credentials::AccessToken(token.trim().to_string()));
    }

    if parsed.get("type").and_then(Value::as_str) == Some("service_account") {
        let client_email = parsed
            .get("client_email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(Credentials::ServiceAccount {
            client_email,
            raw: trimmed.to_string(),
        });
    }

    Err(CapabilityError::new(
        ErrorKind::Auth,
        "credentials JSON has neither `access_token` nor a service-account key",
    ))
}

/// Turns parsed credentials into a bearer token.
///
/// Service-account keys are exchanged by `token_command`, which runs with
/// `GOOGLE_APPLICATION_CREDENTIALS` pointing at a private copy of the key and
/// must print the access token on stdout.
pub fn resolve_access_token(
    creds: &Credentials,
    token_command: Option<&str>,
    timeout_secs: u64,
) -> Result<String, CapabilityError> {
    let (client_email, raw) = match creds {
        Credentials::AccessToken(token) => return Ok(token.clone()),
        Credentials::ServiceAccount { client_email, raw } => (client_email, raw),
    };

    let Some(command) = token_command.map(str::trim).filter(|c| !c.is_empty()) else {
        return Err(CapabilityError::new(
            ErrorKind::Auth,
            format!(
                "service account {client_email} needs LAUDO_TOKEN_COMMAND to mint an access token"
            ),
        ));
    };

    let mut key_file = tempfile::NamedTempFile::new()?;
    key_file.write_all(raw.as_bytes())?;
    key_file.flush()?;

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .env("GOOGLE_APPLICATION_CREDENTIALS", key_file.path());
    let output = run_command_with_optional_timeout(&mut cmd, Some(timeout_secs))
        .map_err(|err| CapabilityError::new(ErrorKind::Auth, format!("{err:#}")))?;

    if !output.status.success() {
        return Err(CapabilityError::new(
            ErrorKind::Auth,
            format!(
                "token command failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(CapabilityError::new(
            ErrorKind::Auth,
            "token command printed nothing",
        ));
    }
    Ok(token)
}
