use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static TASY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)tasy[\s\-_]*([0-9]{2,10})(?:[^0-9]|$)").expect("valid regex")
});

/// Extracts the normalized TASY number from a file name.
///
/// `"TASY-000123.pdf"`, `"tasy_123.pdf"` and `"tasy 123.pdf"` all yield
/// `"123"`. The digit run must be 2-10 digits long and not followed by
/// another digit.
pub fn extract_identifier(file_name: &str) -> Option<String> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let caps = TASY_RE.captures(stem)?;
    let digits = caps.get(1)?.as_str();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        Some("0".to_string())
    } else {
        Some(trimmed.to_string())
    }
}
