fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn format_warning(code: &str, stage: &str, item: &str, path: &str, reason: &str, err: &str) -> String {
    format!(
        "LAUDO_WARN code={} stage={} item={} path={} reason={} err={}",
        sanitize_value(code),
        sanitize_value(stage),
        sanitize_value(item),
        sanitize_value(path),
        sanitize_value(reason),
        sanitize_value(err),
    )
}

pub fn emit(code: &str, stage: &str, item: &str, path: &str, reason: &str, err: &str) {
    eprintln!("{}", format_warning(code, stage, item, path, reason, err));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
        assert_eq!(sanitize_value("2024/Relatório X.pdf"), "2024/Relatório_X.pdf");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn warning_line_is_single_line_key_values() {
        let line = format_warning("DOWNLOAD_FAILED", "download", "abc", "2024/a b.pdf", "http", "403\nforbidden");
        assert_eq!(
            line,
            "LAUDO_WARN code=DOWNLOAD_FAILED stage=download item=abc path=2024/a_b.pdf reason=http err=403_forbidden"
        );
    }
}
