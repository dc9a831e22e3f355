//! Pattern detection over evidence text: publication years, monetary and
//! percentage figures, and coarse topic terms.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

const MIN_YEAR: i32 = 1950;
const MAX_YEAR: i32 = 2100;

/// Characters allowed between an anchor keyword and its year.
const ANCHOR_WINDOW: usize = 40;

static YEAR_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(19[5-9]\d|20\d\d|2100)\b").ok());

static ANCHOR_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:amend\w*|effective|w\.e\.f\.?|notif\w*|with effect from)").ok()
});

static MONEY_SYMBOL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:₹|\brs\.?|\binr)\s*(\d[\d,]*(?:\.\d+)?)(?:\s*(crores?|lakhs?|lacs?|thousand|cr|lk)\b)?",
    )
    .ok()
});

static MONEY_UNIT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*(?:\.\d+)?)\s*(crores?|lakhs?|lacs?)\b").ok()
});

static PERCENT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:%|percent\b|per cent\b)").ok()
});

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "among", "been", "before", "being", "below",
    "between", "both", "could", "does", "doing", "during", "each", "every", "from", "further",
    "have", "having", "here", "into", "itself", "just", "more", "most", "must", "only", "other",
    "over", "same", "shall", "should", "some", "such", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "under", "until", "upon", "very",
    "what", "when", "where", "which", "while", "will", "with", "within", "would", "your",
    "amended", "amendment", "effective", "latest", "notification", "notified", "year", "years",
];

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "june", "july", "august", "september", "october",
    "november", "december", "sept",
];

const UNITS: &[&str] = &[
    "crore", "crores", "lakh", "lakhs", "lacs", "thousand", "rupee", "rupees", "percent",
];

/// Best-effort publication year of a passage.
///
/// A year directly following wording such as "amended" or "w.e.f." wins,
/// the latest such year if there are several. Otherwise the latest plausible
/// year mentioned anywhere is used. Numbers that are really amounts
/// (`₹2000 crore`, `2025%`) are ignored.
pub fn detect_year(text: &str) -> Option<i32> {
    let years = candidate_years(text);
    if years.is_empty() {
        return None;
    }

    if let Some(anchor_re) = ANCHOR_RE.as_ref() {
        let anchored = anchor_re
            .find_iter(text)
            .filter_map(|m| {
                years
                    .iter()
                    .find(|(start, _)| *start >= m.end())
                    .filter(|(start, _)| text[m.end()..*start].chars().count() <= ANCHOR_WINDOW)
                    .map(|(_, year)| *year)
            })
            .max();
        if anchored.is_some() {
            return anchored;
        }
    }

    years.into_iter().map(|(_, year)| year).max()
}

/// Year of a search result's date string. Relative dates ("3 days ago")
/// resolve to `current_year`.
pub fn year_from_date(date: &str, current_year: i32) -> Option<i32> {
    if date.to_lowercase().contains("ago") {
        return Some(current_year);
    }
    candidate_years(date).into_iter().map(|(_, y)| y).max()
}

fn candidate_years(text: &str) -> Vec<(usize, i32)> {
    let Some(re) = YEAR_RE.as_ref() else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(1)?;
            let year: i32 = m.as_str().parse().ok()?;
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) || is_amount(text, m.start(), m.end()) {
                return None;
            }
            Some((m.start(), year))
        })
        .collect()
}

fn is_amount(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].trim_end().to_lowercase();
    let after = text[end..].trim_start().to_lowercase();

    let last_word = before.rsplit(char::is_whitespace).next().unwrap_or("");

    last_word.ends_with('₹')
        || matches!(last_word, "rs" | "rs." | "inr")
        || after.starts_with("crore")
        || after.starts_with("lakh")
        || after.starts_with("lac")
        || after.starts_with('%')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuantityKind {
    Money,
    Percent,
}

/// A figure stated in a passage. Money is normalised to rupees.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub kind: QuantityKind,
    pub value: f64,
    /// The figure exactly as written in the passage.
    pub raw: String,
}

impl Quantity {
    /// Comparable key (value in hundredths).
    pub fn key(&self) -> (QuantityKind, i64) {
        (self.kind, (self.value * 100.0).round() as i64)
    }
}

/// Monetary and percentage figures in order of appearance.
pub fn extract_quantities(text: &str) -> Vec<Quantity> {
    let mut found: Vec<(usize, usize, Quantity)> = Vec::new();

    if let Some(re) = MONEY_SYMBOL_RE.as_ref() {
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let unit = caps.get(2).map(|u| u.as_str());
            if let Some(value) = money_value(number.as_str(), unit) {
                found.push((
                    whole.start(),
                    whole.end(),
                    Quantity {
                        kind: QuantityKind::Money,
                        value,
                        raw: whole.as_str().trim().to_string(),
                    },
                ));
            }
        }
    }

    if let Some(re) = MONEY_UNIT_RE.as_ref() {
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(number), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let overlaps = found
                .iter()
                .any(|(s, e, _)| whole.start() < *e && *s < whole.end());
            if overlaps {
                continue;
            }
            if let Some(value) = money_value(number.as_str(), Some(unit.as_str())) {
                found.push((
                    whole.start(),
                    whole.end(),
                    Quantity {
                        kind: QuantityKind::Money,
                        value,
                        raw: whole.as_str().trim().to_string(),
                    },
                ));
            }
        }
    }

    if let Some(re) = PERCENT_RE.as_ref() {
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if let Ok(value) = number.as_str().parse::<f64>() {
                found.push((
                    whole.start(),
                    whole.end(),
                    Quantity {
                        kind: QuantityKind::Percent,
                        value,
                        raw: whole.as_str().trim().to_string(),
                    },
                ));
            }
        }
    }

    found.sort_by_key(|(start, _, _)| *start);
    found.into_iter().map(|(_, _, q)| q).collect()
}

fn money_value(number: &str, unit: Option<&str>) -> Option<f64> {
    let base: f64 = number.replace(',', "").parse().ok()?;
    let multiplier = match unit.map(str::to_lowercase).as_deref() {
        Some(u) if u.starts_with("cr") => 1e7,
        Some(u) if u.starts_with("lakh") || u.starts_with("lac") || u == "lk" => 1e5,
        Some("thousand") => 1e3,
        _ => 1.0,
    };
    Some(base * multiplier)
}

/// Content words used to decide whether two passages talk about the same
/// thing. Short words, stopwords, months, units and bare numbers are
/// dropped; a plural `s` is stripped.
pub fn significant_terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 3)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| {
            !STOPWORDS.contains(&w.as_str())
                && !MONTHS.contains(&w.as_str())
                && !UNITS.contains(&w.as_str())
        })
        .map(|w| {
            if w.chars().count() > 4 && w.ends_with('s') && !w.ends_with("ss") {
                w[..w.len() - 1].to_string()
            } else {
                w
            }
        })
        .collect()
}
