use std::collections::HashMap;

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A relative phrase like `"3 days ago"`: an integer quantity directly in
    /// front of a known unit, closed off by "ago".
    pub(crate) static ref RE_RELATIVE_PHRASE: Regex = Regex::new(
        r"(?mi)(?P<qty>\d+)\s*(?P<unit>minutes|mins|hours?|days?|weeks?|months?)\s+ago"
    )
    .unwrap();
}

/// Resolves the display-date vocabulary of the results pages into absolute
/// instants.
///
/// Normalization never fails loudly: whatever cannot be resolved comes back
/// as `None`, the "unparseable" sentinel, and the caller keeps the display
/// text untouched.
pub struct DateNormalizer;

impl DateNormalizer {
    /// Normalizes `text` against the current local time.
    pub fn normalize(text: &str) -> Option<NaiveDateTime> {
        DateNormalizer::normalize_at(text, Local::now().naive_local())
    }

    /// Normalizes `text` against an explicit `now`, first match wins:
    ///
    /// 1. blank input resolves to the sentinel,
    /// 2. relative phrases ("3 days ago", "15 mins ago") subtract from `now`,
    /// 3. "yesterday" subtracts one day,
    /// 4. absolute forms are tokenized against a fixed month table, with a
    ///    fuzzy parse as the last resort for machine-style timestamps.
    pub fn normalize_at(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let text = DateNormalizer::reduce_range(text).trim();
        if text.is_empty() {
            return None;
        }

        let lower = text.to_lowercase();
        if lower.contains(" ago") {
            return DateNormalizer::subtract_relative(&lower, now);
        }
        if lower.contains("yesterday") {
            return now.checked_sub_signed(Duration::days(1));
        }

        DateNormalizer::absolute(text, now).or_else(|| DateNormalizer::fuzzy_dtparse(text))
    }

    /// Reduces double-dot range syntax (`"Oct 1..Oct 5"`) to the text after
    /// the last `".."`, with a single leading space trimmed.
    pub fn reduce_range(text: &str) -> &str {
        let reduced = match text.rfind("..") {
            Some(idx) => &text[idx + 2..],
            None => text,
        };
        reduced.strip_prefix(' ').unwrap_or(reduced)
    }

    /// Parses a machine-readable timestamp such as the `datetime` attribute
    /// of a `<time>` node, dropping any timezone.
    pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
        DateNormalizer::fuzzy_dtparse(text)
    }

    fn subtract_relative(lower: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let caps = RE_RELATIVE_PHRASE.captures(lower)?;
        let quantity: u32 = caps.name("qty")?.as_str().parse().ok()?;
        let unit = caps.name("unit")?.as_str();

        if unit.starts_with("min") {
            now.checked_sub_signed(Duration::minutes(i64::from(quantity)))
        } else if unit.starts_with("hour") {
            now.checked_sub_signed(Duration::hours(i64::from(quantity)))
        } else if unit.starts_with("day") {
            now.checked_sub_signed(Duration::days(i64::from(quantity)))
        } else if unit.starts_with("week") {
            now.checked_sub_signed(Duration::days(7 * i64::from(quantity)))
        } else if unit.starts_with("month") {
            now.checked_sub_months(Months::new(quantity))
        } else {
            None
        }
    }

    /// The partial day/month/year forms: separators normalized to spaces, a
    /// missing year defaults to the current one, a missing day to the first
    /// of the month.
    fn absolute(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let cleaned = text.replace('/', " ");
        let mut tokens: Vec<String> = cleaned.split(' ').map(str::to_string).collect();

        if tokens.len() == 2 {
            tokens.push(now.year().to_string());
        }
        if tokens.len() != 3 {
            return None;
        }
        if tokens[0].is_empty() {
            tokens[0] = "1".to_string();
        }

        let day: u32 = tokens[0].parse().ok()?;
        let month = month_number(&tokens[1])?;
        let year: i32 = tokens[2].parse().ok()?;

        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
    }

    fn fuzzy_dtparse(text: &str) -> Option<NaiveDateTime> {
        let tzinfos = HashMap::new();
        let parser = dtparse::Parser::default();
        parser
            .parse(
                text, None, None, true, /* turns on fuzzy mode */
                true, /* gives us the tokens that weren't recognized */
                None, false, &tzinfos,
            )
            .map(|(date, _, _)| date)
            .ok()
    }
}

/// Fixed month table: three and four letter abbreviations plus zero-padded
/// numeric forms.
fn month_number(token: &str) -> Option<u32> {
    let number = match token {
        "Jan" | "01" => 1,
        "Feb" | "02" => 2,
        "Mar" | "03" => 3,
        "Apr" | "04" => 4,
        "May" | "05" => 5,
        "Jun" | "06" => 6,
        "Jul" | "07" => 7,
        "Aug" | "08" => 8,
        "Sep" | "Sept" | "09" => 9,
        "Oct" | "10" => 10,
        "Nov" | "11" => 11,
        "Dec" | "12" => 12,
        _ => return None,
    };
    Some(number)
}
