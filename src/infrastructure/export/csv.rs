// CSV renderer - Flat rows with a header taken from the first row
use crate::domain::report::{display_value, ReportDocument, Row};
use std::borrow::Cow;

/// Header is the key set of the first row. Later rows are read by those keys,
/// so rows are expected to share the first row's schema; extra keys are
/// dropped and missing ones render blank.
pub fn rows_to_csv(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let headers: Vec<&String> = first.keys().collect();

    let mut out = String::new();
    push_record(&mut out, headers.iter().map(|h| h.to_string()));
    for row in rows {
        push_record(
            &mut out,
            headers
                .iter()
                .map(|h| row.get(h.as_str()).map(display_value).unwrap_or_default()),
        );
    }
    out
}

pub fn render(doc: &ReportDocument) -> Vec<u8> {
    rows_to_csv(doc.raw.rows()).into_bytes()
}

fn push_record(out: &mut String, fields: impl Iterator<Item = String>) {
    for (idx, field) in fields.enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(&field));
    }
    out.push('\n');
}

fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
