use chrono::{Datelike, NaiveDate};

/// Accepted layouts, tried in order; the first that parses the whole input wins
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y/%m/%d",
];

/// Indonesian month names and abbreviations mapped to their English form
const MONTH_NAMES: &[(&str, &str)] = &[
    ("januari", "January"),
    ("februari", "February"),
    ("pebruari", "February"),
    ("maret", "March"),
    ("april", "April"),
    ("mei", "May"),
    ("juni", "June"),
    ("juli", "July"),
    ("agustus", "August"),
    ("september", "September"),
    ("oktober", "October"),
    ("nopember", "November"),
    ("november", "November"),
    ("desember", "December"),
    ("jan", "Jan"),
    ("feb", "Feb"),
    ("peb", "Feb"),
    ("mar", "Mar"),
    ("apr", "Apr"),
    ("jun", "Jun"),
    ("jul", "Jul"),
    ("agu", "Aug"),
    ("agt", "Aug"),
    ("ags", "Aug"),
    ("sep", "Sep"),
    ("okt", "Oct"),
    ("nop", "Nov"),
    ("nov", "Nov"),
    ("des", "Dec"),
];

/// Normalize a date string to ISO `YYYY-MM-DD`, or `None` if no format matches.
///
/// The year must be written with four digits; `28/01/26` is ambiguous and stays
/// unnormalized.
pub fn normalize_date(input: &str) -> Option<String> {
    let compact = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.is_empty() {
        return None;
    }

    let translated = translate_month_names(&compact);

    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(&translated, format)
            .ok()
            .filter(|date| (1000..=9999).contains(&date.year()))
            .map(|date| date.format("%Y-%m-%d").to_string())
    })
}

/// Normalize when possible, otherwise return the trimmed input unchanged
pub fn normalize_or_keep(input: &str) -> String {
    normalize_date(input).unwrap_or_else(|| input.trim().to_string())
}

fn translate_month_names(text: &str) -> String {
    text.split(' ')
        .map(|token| {
            let lower = token.to_lowercase();
            MONTH_NAMES
                .iter()
                .find(|(indonesian, _)| *indonesian == lower)
                .map(|(_, english)| (*english).to_string())
                .unwrap_or_else(|| token.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
