//! Relative Date Parser: turns "3 months", "za dwa tygodnie", "od zaraz"
//! or an explicit date into an absolute `NaiveDate`.
//!
//! `None` means the date cannot be auto-filled. Callers never substitute a default.

use std::fmt::Write;

use chrono::{Days, Local, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::matching::text::{contains_term, normalize_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Days,
    Weeks,
    Months,
    Years,
}

const UNIT_PATTERN: &str = r"(days?|weeks?|months?|years?|dnia|dni|dzień|tygodnia|tygodnie|tygodni|tydzień|miesiąca|miesiące|miesięcy|miesiąc|roku|rok|lata|lat)";

/// Number words 1–12 in English and Polish.
const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("jeden", 1),
    ("jedna", 1),
    ("jedno", 1),
    ("dwa", 2),
    ("dwie", 2),
    ("trzy", 3),
    ("cztery", 4),
    ("pięć", 5),
    ("sześć", 6),
    ("siedem", 7),
    ("osiem", 8),
    ("dziewięć", 9),
    ("dziesięć", 10),
    ("jedenaście", 11),
    ("dwanaście", 12),
];

const TOMORROW_TERMS: &[&str] = &["tomorrow", "jutro", "od jutra"];

const NOW_TERMS: &[&str] = &[
    "now",
    "immediately",
    "asap",
    "right away",
    "od zaraz",
    "od razu",
    "natychmiast",
    "teraz",
    "zaraz",
];

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("iso date regex is valid"));

static DMY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})\b").expect("dmy date regex is valid")
});

static DIGIT_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,3}})\s*{UNIT_PATTERN}\b")).expect("digit unit regex is valid")
});

static WORD_UNIT: Lazy<Regex> = Lazy::new(|| {
    let words = NUMBER_WORDS
        .iter()
        .map(|(w, _)| *w)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({words})\s+{UNIT_PATTERN}\b")).expect("word unit regex is valid")
});

/// Parses `text` relative to the local calendar date.
pub fn parse_relative_date(text: &str) -> Option<NaiveDate> {
    parse_at(text, Local::now().date_naive())
}

/// Parses `text` relative to `today`.
pub fn parse_at(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(c) = ISO_DATE.captures(text) {
        let (y, m, d) = (num(&c[1])?, num(&c[2])?, num(&c[3])?);
        return NaiveDate::from_ymd_opt(y as i32, m, d);
    }
    if let Some(c) = DMY_DATE.captures(text) {
        let (d, m, y) = (num(&c[1])?, num(&c[2])?, num(&c[3])?);
        return NaiveDate::from_ymd_opt(y as i32, m, d);
    }
    if let Some(c) = DIGIT_UNIT.captures(text) {
        return add_units(today, num(&c[1])?, unit_of(&c[2])?);
    }
    if let Some(c) = WORD_UNIT.captures(text) {
        let word = c[1].to_lowercase();
        let n = NUMBER_WORDS.iter().find(|(w, _)| *w == word)?.1;
        return add_units(today, n, unit_of(&c[2])?);
    }

    let normalized = normalize_text(text);
    if TOMORROW_TERMS.iter().any(|t| contains_term(&normalized, t)) {
        return today.checked_add_days(Days::new(1));
    }
    if NOW_TERMS.iter().any(|t| contains_term(&normalized, t)) {
        return Some(today);
    }
    None
}

/// Renders `date` using a field format hint such as "DD/MM/YYYY" or a
/// strftime string. Falls back to ISO for a missing or unusable hint.
pub fn format_date(date: NaiveDate, format: Option<&str>) -> String {
    let iso = date.format("%Y-%m-%d").to_string();
    let Some(format) = format.map(str::trim).filter(|f| !f.is_empty()) else {
        return iso;
    };

    let pattern = if format.contains('%') {
        format.to_string()
    } else {
        format
            .replace("YYYY", "%Y")
            .replace("yyyy", "%Y")
            .replace("MM", "%m")
            .replace("mm", "%m")
            .replace("DD", "%d")
            .replace("dd", "%d")
    };
    if !pattern.contains('%') {
        return iso;
    }

    let mut out = String::new();
    match write!(out, "{}", date.format(&pattern)) {
        Ok(()) => out,
        Err(_) => iso,
    }
}

fn num(s: &str) -> Option<u32> {
    s.parse().ok()
}

fn unit_of(token: &str) -> Option<Unit> {
    let token = token.to_lowercase();
    let unit = match token.as_str() {
        "day" | "days" | "dnia" | "dni" | "dzień" => Unit::Days,
        "week" | "weeks" | "tygodnia" | "tygodnie" | "tygodni" | "tydzień" => Unit::Weeks,
        "month" | "months" | "miesiąca" | "miesiące" | "miesięcy" | "miesiąc" => Unit::Months,
        "year" | "years" | "roku" | "rok" | "lata" | "lat" => Unit::Years,
        _ => return None,
    };
    Some(unit)
}

fn add_units(today: NaiveDate, n: u32, unit: Unit) -> Option<NaiveDate> {
    match unit {
        Unit::Days => today.checked_add_days(Days::new(n as u64)),
        Unit::Weeks => today.checked_add_days(Days::new(n as u64 * 7)),
        Unit::Months => today.checked_add_months(Months::new(n)),
        Unit::Years => today.checked_add_months(Months::new(n.checked_mul(12)?)),
    }
}
