use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

const HEADER_SCAN_LINES: usize = 40;

static DATE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2})[/\-.]([0-9]{1,2})[/\-.]([0-9]{2,4})").expect("valid regex")
});

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*data(?:\s*[:\-]\s*|\s+)([0-9]{1,2}[/\-.][0-9]{1,2}[/\-.][0-9]{2,4})(?:[^0-9]|$)")
        .expect("valid regex")
});

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(emiss[aã]o|data do laudo|data do relat[oó]rio|relat[oó]rio|laudo|realizado em|calibra[cç][aã]o|inspe[cç][aã]o)",
    )
    .expect("valid regex")
});

static EXCLUSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(validade|v[aá]lid[oa]s? at[eé]|vencimento|vence em|expira|pr[oó]xim[ao])")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    NoText,
    HeaderDate,
    FilenameDate,
    KeywordDate,
    MaxDate,
    NoDate,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoText => "NO_TEXT",
            Self::HeaderDate => "HEADER_DATE",
            Self::FilenameDate => "FILENAME_DATE",
            Self::KeywordDate => "KEYWORD_DATE",
            Self::MaxDate => "MAX_DATE",
            Self::NoDate => "NO_DATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCandidate {
    pub date: NaiveDate,
    pub reason: ReasonCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOutcome {
    Found(DateCandidate),
    /// Carries `NoText` or `NoDate`.
    Missing(ReasonCode),
}

impl DateOutcome {
    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::Found(candidate) => candidate.reason,
            Self::Missing(reason) => *reason,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Found(candidate) => Some(candidate.date),
            Self::Missing(_) => None,
        }
    }
}

/// Places a two-digit year in the century window of 50 years either side of
/// `this_year`.
fn expand_two_digit_year(yy: i32, this_year: i32) -> i32 {
    let year = this_year / 100 * 100 + yy;
    if year >= this_year + 50 {
        year - 100
    } else if year < this_year - 50 {
        year + 100
    } else {
        year
    }
}

/// Day-first, falling back to month-first only when day-first is not a real
/// calendar date.
fn parse_dmy(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let year = match year.len() {
        2 => expand_two_digit_year(year.parse().ok()?, Local::now().year()),
        4 => year.parse().ok()?,
        _ => return None,
    };
    let first: u32 = day.parse().ok()?;
    let second: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, second, first)
        .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
}

pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let caps = DATE_TOKEN_RE.captures(token)?;
    parse_dmy(&caps[1], &caps[2], &caps[3])
}

fn digit_at(bytes: &[u8], idx: Option<usize>) -> bool {
    idx.and_then(|i| bytes.get(i)).is_some_and(u8::is_ascii_digit)
}

/// Every valid date token in `text`, in order of appearance. Tokens glued to
/// further digits are not dates.
pub fn date_tokens(text: &str) -> Vec<NaiveDate> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    for caps in DATE_TOKEN_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if digit_at(bytes, whole.start().checked_sub(1)) || digit_at(bytes, Some(whole.end())) {
            continue;
        }
        if let Some(date) = parse_dmy(&caps[1], &caps[2], &caps[3]) {
            out.push(date);
        }
    }
    out
}

fn header_date(text: &str) -> Option<NaiveDate> {
    text.lines()
        .take(HEADER_SCAN_LINES)
        .filter_map(|line| HEADER_RE.captures(line))
        .find_map(|caps| parse_date_token(&caps[1]))
}

fn keyword_date(text: &str) -> Option<NaiveDate> {
    text.lines()
        .filter(|line| KEYWORD_RE.is_match(line) && !EXCLUSION_RE.is_match(line))
        .flat_map(date_tokens)
        .max()
}

/// Picks the effective date of a report from its extracted text and file
/// name. Tiers, first hit wins:
///
/// 1. a `Data: dd/mm/yyyy` header in the first 40 lines,
/// 2. a date in the file name,
/// 3. the latest date on lines with a report keyword and no validity keyword,
/// 4. the latest date anywhere in the text.
pub fn pick_date(text: &str, file_name: &str) -> DateOutcome {
    if text.trim().is_empty() {
        return DateOutcome::Missing(ReasonCode::NoText);
    }

    let found = |date, reason| DateOutcome::Found(DateCandidate { date, reason });

    if let Some(date) = header_date(text) {
        return found(date, ReasonCode::HeaderDate);
    }
    if let Some(date) = date_tokens(file_name).into_iter().next() {
        return found(date, ReasonCode::FilenameDate);
    }
    if let Some(date) = keyword_date(text) {
        return found(date, ReasonCode::KeywordDate);
    }
    if let Some(date) = date_tokens(text).into_iter().max() {
        return found(date, ReasonCode::MaxDate);
    }

    DateOutcome::Missing(ReasonCode::NoDate)
}
