use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Client;

use crate::error::TrackerError;
use crate::models::course::CourseSnapshot;

const SEATING_TABLE_SUMMARY: &str = "This layout table is used to present the seating numbers.";

static HEADER_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<th[^>]*class\s*=\s*"?ddlabel"?[^>]*>(.*?)</th>"#).expect("valid regex")
});
static SEATING_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    let summary = regex::escape(SEATING_TABLE_SUMMARY);
    Regex::new(&format!(r#"(?is)<table[^>]*summary\s*=\s*"{}"[^>]*>(.*?)</table>"#, summary))
        .expect("valid regex")
});
static DATA_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<td[^>]*class\s*=\s*"?dddefault"?[^>]*>(.*?)</td>"#).expect("valid regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

/// Source of current seat counts for a course section.
#[async_trait]
pub trait CourseFetcher: Send + Sync {
    /// `NotFound` when the page has no usable course data, `Fetch` for
    /// transport failures.
    async fn fetch(&self, term: &str, crn: &str) -> Result<CourseSnapshot, TrackerError>;
}

/// Client for the public class schedule detail page.
#[derive(Clone)]
pub struct OscarFetcher {
    client: Client,
    detail_url: String,
}

impl OscarFetcher {
    pub fn new(detail_url: String, timeout: Duration) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, detail_url })
    }
}

#[async_trait]
impl CourseFetcher for OscarFetcher {
    async fn fetch(&self, term: &str, crn: &str) -> Result<CourseSnapshot, TrackerError> {
        log::debug!("Fetching course page for CRN {} (term {})", crn, term);

        let response = self
            .client
            .get(&self.detail_url)
            .query(&[("term_in", term), ("crn_in", crn)])
            .send()
            .await
            .map_err(|e| TrackerError::fetch(crn, e))?;

        if !response.status().is_success() {
            return Err(TrackerError::fetch(crn, format!("HTTP {}", response.status())));
        }

        let html = response.text().await.map_err(|e| TrackerError::fetch(crn, e))?;
        parse_course_page(crn, &html)
    }
}

/// Extracts the course header and seating numbers from a detail page.
///
/// The header reads `Title - CRN - Subject Number - Section`; the seating
/// table lists capacity, actual and remaining for seats, then the same three
/// for the waitlist.
pub fn parse_course_page(crn: &str, html: &str) -> Result<CourseSnapshot, TrackerError> {
    let not_found = || TrackerError::NotFound(crn.to_string());

    let header = HEADER_CELL
        .captures(html)
        .map(|c| cell_text(&c[1]))
        .ok_or_else(not_found)?;
    let (title, course, section) = split_header(&header).ok_or_else(not_found)?;

    let table = SEATING_TABLE
        .captures(html)
        .map(|c| c[1].to_string())
        .ok_or_else(not_found)?;
    let numbers = DATA_CELL
        .captures_iter(&table)
        .map(|c| parse_count(&cell_text(&c[1])))
        .collect::<Option<Vec<u32>>>()
        .ok_or_else(not_found)?;

    if numbers.len() < 6 {
        return Err(not_found());
    }

    Ok(CourseSnapshot {
        crn: crn.to_string(),
        title,
        course,
        section,
        capacity: numbers[0],
        enrolled: numbers[1],
        remaining_seats: numbers[2],
        waitlist_capacity: numbers[3],
        waitlist_enrolled: numbers[4],
        waitlist_count: numbers[5],
        fetched_at: Utc::now(),
    })
}

fn split_header(header: &str) -> Option<(String, String, String)> {
    // Titles may themselves contain " - ", so read the last three fields from the end.
    let parts: Vec<&str> = header.split(" - ").collect();
    if parts.len() < 4 {
        return None;
    }
    let n = parts.len();
    let title = parts[..n - 3].join(" - ");
    Some((title, parts[n - 2].to_string(), parts[n - 1].to_string()))
}

/// Remaining counts go negative when a section is over-enrolled.
fn parse_count(text: &str) -> Option<u32> {
    text.parse::<i64>().ok().map(|n| n.max(0) as u32)
}

fn cell_text(inner: &str) -> String {
    let stripped = TAG.replace_all(inner, " ");
    let decoded = stripped.replace("&nbsp;", " ").replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
