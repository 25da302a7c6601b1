//! The "yesterday" acceptance window and lenient date parsing.
//!
//! All arithmetic happens in UTC. Feeds publish dates in many shapes; parsing
//! tries the feed-standard formats first, then a fixed list of fallbacks, and
//! finally substitutes a caller-supplied instant (normally "now") so a bad
//! date never aborts a feed.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Offset-aware fallback formats, tried in order after RFC 2822 / RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%a, %d %b %Y %H:%M:%S %z",
];

/// Naive fallback formats; results are taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_ONLY_FORMAT: &str = "%Y-%m-%d";

/// RFC 822 body once the weekday is dropped and the zone is numeric.
const RFC822_FORMATS: &[&str] = &["%d %b %Y %H:%M:%S %z", "%d %b %Y %H:%M %z"];

/// Zone names seen in RSS `pubDate` values, as numeric offsets.
const NAMED_ZONES: &[(&str, &str)] = &[
    ("UTC", "+0000"),
    ("UT", "+0000"),
    ("GMT", "+0000"),
    ("Z", "+0000"),
    ("KST", "+0900"),
    ("JST", "+0900"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("BST", "+0100"),
    ("IST", "+0530"),
];

/// Inclusive UTC interval covering one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// The UTC calendar day before `now`:
    /// `00:00:00.000000` through `23:59:59.999999`.
    pub fn yesterday(now: DateTime<Utc>) -> Self {
        let day = now.date_naive() - Duration::days(1);
        Self::for_day(day)
    }

    pub fn for_day(day: NaiveDate) -> Self {
        let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
        // 86_399.999_999 seconds after midnight
        let end = start + Duration::days(1) - Duration::microseconds(1);
        Self { start, end }
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Naive timestamps are read as UTC before comparison.
    pub fn contains_naive(&self, ts: NaiveDateTime) -> bool {
        self.contains(ts.and_utc())
    }
}

/// Parses a feed date string to UTC, or `None` if no known format matches.
///
/// Order: RFC 2822 (RSS), RFC 3339 (Atom), lenient RFC 822, offset-aware
/// fallbacks, naive fallbacks, then a bare `YYYY-MM-DD` (midnight UTC). First
/// success wins.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_rfc822_lenient(raw) {
        return Some(dt);
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, DATE_ONLY_FORMAT)
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// RFC 822 the way feeds write it: the weekday is ignored, since it is often
/// wrong, and zone names such as `UTC` or `KST` map to offsets.
fn parse_rfc822_lenient(raw: &str) -> Option<DateTime<Utc>> {
    let body = match raw.split_once(',') {
        Some((_, rest)) => rest.trim(),
        None => raw,
    };
    let (head, zone) = body.rsplit_once(' ')?;
    let offset = NAMED_ZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(zone))
        .map(|(_, offset)| *offset)
        .or_else(|| zone.starts_with(['+', '-']).then_some(zone))?;

    let normalized = format!("{} {}", head.trim(), offset);
    RFC822_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Like [`parse_date`], but an unparseable string yields `fallback`.
///
/// The crawler passes the cycle's "now" here, so such entries land outside
/// the yesterday window unless the crawl runs right at midnight.
pub fn parse_date_or(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match parse_date(raw) {
        Some(dt) => dt,
        None => {
            tracing::debug!(raw = %raw, "Unrecognized date format, using fallback time");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_yesterday_bounds() {
        let w = DateWindow::yesterday(utc(2024, 1, 4, 15, 30, 0));
        assert_eq!(w.start, utc(2024, 1, 3, 0, 0, 0));
        assert_eq!(
            w.end,
            utc(2024, 1, 3, 23, 59, 59) + Duration::microseconds(999_999)
        );
    }

    #[test]
    fn test_yesterday_across_month_and_year() {
        let w = DateWindow::yesterday(utc(2024, 1, 1, 0, 0, 0));
        assert_eq!(w.start, utc(2023, 12, 31, 0, 0, 0));

        let w = DateWindow::yesterday(utc(2024, 3, 1, 12, 0, 0));
        assert_eq!(w.start, utc(2024, 2, 29, 0, 0, 0));
    }

    #[test]
    fn test_window_inclusive_bounds() {
        let w = DateWindow::yesterday(utc(2024, 1, 4, 8, 0, 0));
        assert!(w.contains(utc(2024, 1, 3, 0, 0, 0)));
        assert!(w.contains(utc(2024, 1, 3, 23, 59, 59) + Duration::microseconds(999_999)));
        assert!(!w.contains(utc(2024, 1, 4, 0, 0, 0)));
        assert!(!w.contains(utc(2024, 1, 3, 0, 0, 0) - Duration::microseconds(1)));
    }

    #[test]
    fn test_naive_is_read_as_utc() {
        let w = DateWindow::yesterday(utc(2024, 1, 4, 8, 0, 0));
        let naive = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert!(w.contains_naive(naive));
    }

    #[test]
    fn test_parse_rfc2822() {
        assert_eq!(
            parse_date("Wed, 03 Jan 2024 10:00:00 GMT"),
            Some(utc(2024, 1, 3, 10, 0, 0))
        );
        assert_eq!(
            parse_date("Wed, 03 Jan 2024 10:00:00 +0900"),
            Some(utc(2024, 1, 3, 1, 0, 0))
        );
    }

    #[test]
    fn test_parse_rfc822_named_zones_and_wrong_weekday() {
        assert_eq!(
            parse_date("Wed, 03 Jan 2024 10:00:00 UTC"),
            Some(utc(2024, 1, 3, 10, 0, 0))
        );
        // 3 Jan 2024 was a Wednesday
        assert_eq!(
            parse_date("Tue, 03 Jan 2024 10:00:00 GMT"),
            Some(utc(2024, 1, 3, 10, 0, 0))
        );
        assert_eq!(
            parse_date("Wed, 03 Jan 2024 10:00:00 KST"),
            Some(utc(2024, 1, 3, 1, 0, 0))
        );
        assert_eq!(
            parse_date("3 Jan 2024 10:00 PST"),
            Some(utc(2024, 1, 3, 18, 0, 0))
        );
        assert_eq!(parse_date("Wed, 03 Jan 2024 10:00:00 XYZ"), None);
    }

    #[test]
    fn test_parse_rfc3339_and_iso_fallbacks() {
        assert_eq!(
            parse_date("2024-01-03T10:00:00Z"),
            Some(utc(2024, 1, 3, 10, 0, 0))
        );
        assert_eq!(
            parse_date("2024-01-03T10:00:00+0200"),
            Some(utc(2024, 1, 3, 8, 0, 0))
        );
        assert_eq!(
            parse_date("2024-01-03 10:00:00+0000"),
            Some(utc(2024, 1, 3, 10, 0, 0))
        );
    }

    #[test]
    fn test_parse_naive_and_date_only() {
        assert_eq!(
            parse_date("2024-01-03 10:00:00"),
            Some(utc(2024, 1, 3, 10, 0, 0))
        );
        assert_eq!(
            parse_date("2024-01-03T10:00:00"),
            Some(utc(2024, 1, 3, 10, 0, 0))
        );
        assert_eq!(parse_date("2024-01-03"), Some(utc(2024, 1, 3, 0, 0, 0)));
    }

    #[test]
    fn test_unparseable_falls_back() {
        let now = utc(2024, 1, 4, 8, 0, 0);
        assert_eq!(parse_date("yesterday-ish"), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date_or("not a date", now), now);
        assert!(!DateWindow::yesterday(now).contains(parse_date_or("garbage", now)));
    }

    proptest! {
        #[test]
        fn prop_window_spans_exactly_one_day(secs in 0i64..4_000_000_000i64) {
            let now = DateTime::from_timestamp(secs, 0).unwrap();
            let w = DateWindow::yesterday(now);
            prop_assert_eq!(w.end - w.start, Duration::days(1) - Duration::microseconds(1));
            prop_assert!(w.end < now);
            prop_assert!(now - w.start < Duration::days(2));
            prop_assert!(w.contains(now - Duration::days(1)));
        }
    }
}
