use chrono::{NaiveDate, NaiveDateTime};

// Analyst pages write dates like "Sep. 6, 2019", "May 6, 2019" or "June 3, 2020".
const TEXT_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%b %d %Y", "%B %d %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parses a recommendation's free-text date into a calendar date.
pub fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(d) = parse_iso(trimmed) {
        return Some(d);
    }

    let cleaned = normalize_text_date(trimmed);
    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

/// Parses the date of a price row. Snapshot rows are ISO dates, sometimes with a time part.
pub fn parse_price_date(raw: &str) -> Option<NaiveDate> {
    parse_iso(raw.trim())
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

fn normalize_text_date(s: &str) -> String {
    let no_periods = s.replace('.', "");
    let mut words: Vec<&str> = no_periods.split_whitespace().collect();
    // chrono only knows the three-letter abbreviation.
    if let Some(first) = words.first_mut() {
        if first.eq_ignore_ascii_case("sept") {
            *first = "Sep";
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_abbreviated_month_with_period() {
        assert_eq!(parse_report_date("Sep. 6, 2019"), Some(d(2019, 9, 6)));
        assert_eq!(parse_report_date("Dec. 31, 2021"), Some(d(2021, 12, 31)));
    }

    #[test]
    fn parses_months_written_without_abbreviation() {
        assert_eq!(parse_report_date("May 6, 2019"), Some(d(2019, 5, 6)));
        assert_eq!(parse_report_date("June 3, 2020"), Some(d(2020, 6, 3)));
        assert_eq!(parse_report_date("Sept. 14, 2018"), Some(d(2018, 9, 14)));
    }

    #[test]
    fn parses_iso_and_iso_datetime() {
        assert_eq!(parse_report_date("2024-01-07"), Some(d(2024, 1, 7)));
        assert_eq!(parse_report_date("2024-01-07T15:30:00"), Some(d(2024, 1, 7)));
        assert_eq!(parse_price_date("2024-01-07 00:00:00"), Some(d(2024, 1, 7)));
    }

    #[test]
    fn tolerates_extra_whitespace() {
        assert_eq!(parse_report_date("  Mar.  2,  2022 "), Some(d(2022, 3, 2)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_report_date(""), None);
        assert_eq!(parse_report_date("yesterday"), None);
        assert_eq!(parse_report_date("Foo. 6, 2019"), None);
        assert_eq!(parse_report_date("Feb. 30, 2019"), None);
        assert_eq!(parse_price_date("Sep. 6, 2019"), None);
    }
}
