//! Free-text normalization and the fixed Portuguese labels of the reports.

use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

use super::models::{Activity, Course};

pub const DEFAULT_CAPTION: &str = "Sem legenda";
pub const MISSING_VALUE: &str = "Não informado";
pub const UNKNOWN_PERIOD: &str = "Período não informado";

const DATE_FORMAT: &str = "%d/%m/%Y";

lazy_static! {
    /// One or more blank (or whitespace-only) lines.
    static ref PARAGRAPH_BREAK: Regex = Regex::new(r"\n[ \t]*\n\s*").expect("valid regex");
    static ref LINE_BREAK: Regex = Regex::new(r"[ \t]*\n[ \t]*").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Trim `value`; blank text becomes `None`.
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Split an introduction into paragraphs on blank lines. Newlines inside a
/// paragraph become single spaces.
pub fn split_paragraphs(value: Option<&str>) -> Vec<String> {
    let Some(text) = normalize_text(value) else {
        return Vec::new();
    };
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    PARAGRAPH_BREAK
        .split(&unified)
        .map(|paragraph| LINE_BREAK.replace_all(paragraph.trim(), " ").into_owned())
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

/// Collapse every whitespace run to one space and trim.
pub fn collapse_whitespace(value: &str) -> String {
    WHITESPACE.replace_all(value.trim(), " ").into_owned()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// "{course}" or "{course} — {type}" when the course has a type name.
pub fn report_title(course: &Course) -> String {
    match normalize_text(course.type_name.as_deref()) {
        Some(type_name) => format!("{} — {}", course.name.trim(), type_name),
        None => course.name.trim().to_string(),
    }
}

/// Report period line.
///
/// With a single bound the missing side is left out and the remaining date is
/// introduced with "a partir de" (start only) or "até" (end only), so the line
/// never ends in a dangling "até".
pub fn period_label(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    match (start, end) {
        (Some(start), Some(end)) => {
            format!("Período: {} até {}", format_date(start), format_date(end))
        }
        (Some(start), None) => format!("Período: a partir de {}", format_date(start)),
        (None, Some(end)) => format!("Período: até {}", format_date(end)),
        (None, None) => UNKNOWN_PERIOD.to_string(),
    }
}

/// "dd/MM/yyyy", or "dd/MM/yyyy a dd/MM/yyyy" for multi-day activities.
pub fn activity_date_label(activity: &Activity) -> String {
    match activity.end_date {
        Some(end) if end != activity.realization_date => format!(
            "{} a {}",
            format_date(activity.realization_date),
            format_date(end)
        ),
        _ => format_date(activity.realization_date),
    }
}

pub fn status_label(published: bool) -> &'static str {
    if published {
        "Publicada"
    } else {
        "Não publicada"
    }
}

pub fn caption_or_default(caption: Option<&str>) -> String {
    normalize_text(caption).unwrap_or_else(|| DEFAULT_CAPTION.to_string())
}

pub fn generated_at_label(at: NaiveDateTime) -> String {
    format!("Gerado em {}", at.format("%d/%m/%Y às %H:%M"))
}
