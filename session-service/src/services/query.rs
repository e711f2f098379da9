//! Filtering, pagination and duration averaging over session collections.
//!
//! The in-memory store evaluates these functions directly; the Postgres store
//! pushes the same semantics down into SQL.

use crate::models::Session;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A filtered, 1-indexed page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Case-insensitive substring of any one tag.
    pub tag: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for SessionQuery {
    fn default() -> Self {
        Self {
            name: None,
            tag: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SessionQuery {
    /// Empty filters are dropped; page is clamped to >= 1 and page size to
    /// `1..=MAX_PAGE_SIZE`.
    pub fn new(
        name: Option<String>,
        tag: Option<String>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()),
            tag: tag.filter(|t| !t.is_empty()),
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches before pagination.
    pub total: u64,
}

/// Inclusive range of UTC calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Compares the date component only; time of day is ignored.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let date = instant.date_naive();
        date >= self.start && date <= self.end
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn matches(session: &Session, query: &SessionQuery) -> bool {
    let name_ok = query
        .name
        .as_deref()
        .map_or(true, |name| contains_ignore_case(&session.name, name));
    let tag_ok = query.tag.as_deref().map_or(true, |tag| {
        session.tags.iter().any(|t| contains_ignore_case(t, tag))
    });
    name_ok && tag_ok
}

/// Applies filters then `skip = (page - 1) * page_size, take = page_size`,
/// preserving the input order.
pub fn paginate<'a, I>(sessions: I, query: &SessionQuery) -> Page<Session>
where
    I: IntoIterator<Item = &'a Session>,
{
    let matching: Vec<&Session> = sessions.into_iter().filter(|s| matches(s, query)).collect();
    let total = matching.len() as u64;
    let items = matching
        .into_iter()
        .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
        .take(query.page_size as usize)
        .cloned()
        .collect();
    Page { items, total }
}

/// Arithmetic mean rounded to the millisecond; zero for an empty input.
pub fn mean_duration<I>(durations: I) -> Duration
where
    I: IntoIterator<Item = Duration>,
{
    let (count, total_ms) = durations
        .into_iter()
        .fold((0u64, 0u128), |(n, sum), d| (n + 1, sum + d.as_millis()));
    if count == 0 {
        return Duration::ZERO;
    }
    duration_from_mean_millis(total_ms as f64 / count as f64)
}

pub fn duration_from_mean_millis(mean_ms: f64) -> Duration {
    if !mean_ms.is_finite() || mean_ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis(mean_ms.round() as u64)
}

pub fn average_duration<'a, I>(sessions: I, range: &DateRange) -> Duration
where
    I: IntoIterator<Item = &'a Session>,
{
    mean_duration(
        sessions
            .into_iter()
            .filter(|s| range.contains(s.created_utc))
            .map(|s| s.duration),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token::VersionToken;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn session(name: &str, tags: &[&str], secs: u64, created: DateTime<Utc>) -> Session {
        Session {
            session_id: Uuid::new_v4(),
            etag: VersionToken::new(),
            created_utc: created,
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            duration: Duration::from_secs(secs),
        }
    }

    fn numbered(count: usize) -> Vec<Session> {
        (1..=count)
            .map(|i| session(&format!("session-{:02}", i), &[], 60, Utc::now()))
            .collect()
    }

    #[test]
    fn second_page_of_ten_returns_records_eleven_to_twenty() {
        let sessions = numbered(25);
        let query = SessionQuery::new(None, None, Some(2), Some(10));

        let page = paginate(&sessions, &query);

        let names: Vec<_> = page.items.iter().map(|s| s.name.as_str()).collect();
        let expected: Vec<String> = (11..=20).map(|i| format!("session-{:02}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(page.total, 25);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let sessions = numbered(5);
        let page = paginate(&sessions, &SessionQuery::new(None, None, Some(3), Some(10)));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);
    }

    #[test]
    fn query_normalizes_inputs() {
        let query = SessionQuery::new(Some(String::new()), Some("x".into()), Some(0), Some(0));
        assert_eq!(query.name, None);
        assert_eq!(query.tag.as_deref(), Some("x"));
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 1);
        assert_eq!(SessionQuery::new(None, None, None, Some(10_000)).page_size, MAX_PAGE_SIZE);
        assert_eq!(SessionQuery::default().offset(), 0);
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        let sessions = vec![
            session("Morning Run", &[], 60, Utc::now()),
            session("evening swim", &[], 60, Utc::now()),
        ];
        let query = SessionQuery::new(Some("RUN".into()), None, None, None);
        let page = paginate(&sessions, &query);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Morning Run");
    }

    #[test]
    fn tag_filter_matches_any_element() {
        let sessions = vec![
            session("a", &["Cardio", "outdoor"], 60, Utc::now()),
            session("b", &["strength"], 60, Utc::now()),
            session("c", &[], 60, Utc::now()),
        ];
        let query = SessionQuery::new(None, Some("DOOR".into()), None, None);
        let page = paginate(&sessions, &query);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "a");
    }

    #[test]
    fn filters_combine() {
        let sessions = vec![
            session("run one", &["cardio"], 60, Utc::now()),
            session("run two", &["strength"], 60, Utc::now()),
        ];
        let query = SessionQuery::new(Some("run".into()), Some("str".into()), None, None);
        let page = paginate(&sessions, &query);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "run two");
    }

    #[test]
    fn average_of_empty_range_is_zero() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let sessions = vec![session("a", &[], 60, Utc::now())];
        let range = DateRange::new(day, day);
        assert_eq!(average_duration(&sessions, &range), Duration::ZERO);
    }

    #[test]
    fn average_of_thirty_and_ninety_seconds_is_sixty() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let sessions = vec![
            session("a", &[], 30, created),
            session("b", &[], 90, created),
        ];
        let day = created.date_naive();
        assert_eq!(
            average_duration(&sessions, &DateRange::new(day, day)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn date_range_ignores_time_of_day() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let range = DateRange::new(start, end);

        assert!(range.contains(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 59).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap()));
    }

    #[test]
    fn mean_rounds_to_milliseconds() {
        let mean = mean_duration(vec![Duration::from_millis(1), Duration::from_millis(2)]);
        assert_eq!(mean, Duration::from_millis(2));
    }
}
