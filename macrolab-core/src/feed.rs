//! Weekly calendar ingestion.
//!
//! A feed yields the raw rows of one (year, week) page. Ingestion walks the
//! requested weeks in order and skips any week whose fetch fails, recording
//! it in the run diagnostics. Page parsing sits behind [`WeekPageParser`];
//! [`TableRowParser`] handles the plain `<tr>`/`<td>` layout of the
//! archived calendar pages.

use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::diagnostics::RunDiagnostics;
use crate::domain::RawEventRecord;

/// Weeks per calendar year as numbered by the source.
pub const WEEKS: RangeInclusive<u32> = 1..=53;

const DEFAULT_BASE_URL: &str = "http://biz.yahoo.com/c/ec";

/// Cells per data row: Date, Time, Statistic, For, Actual, Briefing
/// Forecast, Market Expects, Prior, Revised.
pub const ROW_CELLS: usize = 9;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("week {year}-{week:02}: {reason}")]
    Parse { year: i32, week: u32, reason: String },
}

/// Source of one week of raw calendar rows.
pub trait EventFeed {
    fn fetch_week(&self, year: i32, week: u32) -> Result<Vec<RawEventRecord>, FeedError>;
}

/// Turns a page body into rows of [`ROW_CELLS`] cell texts.
pub trait WeekPageParser {
    fn parse(&self, body: &str) -> Result<Vec<Vec<String>>, String>;
}

/// Fetch every week of `years`, skipping failed weeks.
pub fn collect_weeks<F: EventFeed + ?Sized>(
    feed: &F,
    years: RangeInclusive<i32>,
    diagnostics: &mut RunDiagnostics,
) -> Vec<RawEventRecord> {
    let mut records = Vec::new();
    for year in years {
        for week in WEEKS {
            match feed.fetch_week(year, week) {
                Ok(rows) => {
                    debug!(year, week, rows = rows.len(), "week fetched");
                    records.extend(rows);
                }
                Err(e) => {
                    warn!(year, week, error = %e, "skipping week");
                    diagnostics.skipped_weeks.push(format!("{year}-{week:02}"));
                }
            }
        }
    }
    diagnostics.records_in += records.len();
    info!(
        records = records.len(),
        skipped = diagnostics.skipped_weeks.len(),
        "calendar ingestion done"
    );
    records
}

/// Build a record from one parsed row.
pub fn record_from_cells(year: i32, week: u32, cells: &[String]) -> Option<RawEventRecord> {
    let [date, time, statistic, period, actual, briefing, market, prior, revised] = cells else {
        return None;
    };
    Some(RawEventRecord {
        year: year.to_string(),
        week: format!("{week:02}"),
        date: date.clone(),
        time: time.clone(),
        statistic: statistic.clone(),
        period: period.clone(),
        actual: actual.clone(),
        briefing_forecast: briefing.clone(),
        market_expects: market.clone(),
        prior: prior.clone(),
        revised: revised.clone(),
    })
}

/// URL of one week page, e.g. `.../201002.html`.
pub fn week_url(base: &str, year: i32, week: u32) -> String {
    format!("{}/{year}{week:02}.html", base.trim_end_matches('/'))
}

/// Feed over HTTP week pages.
pub struct HttpWeekFeed<P> {
    client: reqwest::blocking::Client,
    base_url: String,
    parser: P,
    pause: Duration,
}

impl<P: WeekPageParser> HttpWeekFeed<P> {
    pub fn new(parser: P) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| FeedError::Http {
                url: DEFAULT_BASE_URL.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            parser,
            pause: Duration::from_millis(250),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Delay after every request.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

impl<P: WeekPageParser> EventFeed for HttpWeekFeed<P> {
    fn fetch_week(&self, year: i32, week: u32) -> Result<Vec<RawEventRecord>, FeedError> {
        let url = week_url(&self.base_url, year, week);
        let response = self.client.get(&url).send().map_err(|source| FeedError::Http {
            url: url.clone(),
            source,
        });
        if !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
        let response = response?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = response
            .text()
            .map_err(|source| FeedError::Http { url, source })?;

        let rows = self
            .parser
            .parse(&body)
            .map_err(|reason| FeedError::Parse { year, week, reason })?;
        Ok(rows
            .iter()
            .filter_map(|cells| record_from_cells(year, week, cells))
            .collect())
    }
}

/// Minimal table scanner: every `<tr>` with exactly [`ROW_CELLS`] `<td>`
/// cells whose first cell is not the `Date` header is a data row. Tags
/// inside cells are stripped and whitespace collapsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableRowParser;

impl WeekPageParser for TableRowParser {
    fn parse(&self, body: &str) -> Result<Vec<Vec<String>>, String> {
        let lower = body.to_ascii_lowercase();
        if !lower.contains("<table") {
            return Err("page has no table".into());
        }

        let mut rows = Vec::new();
        for (start, end) in elements(&lower, "tr") {
            let row_lower = &lower[start..end];
            let cells: Vec<String> = elements(row_lower, "td")
                .into_iter()
                .map(|(s, e)| cell_text(&body[start + s..start + e]))
                .collect();
            if cells.len() == ROW_CELLS && !cells[0].eq_ignore_ascii_case("date") {
                rows.push(cells);
            }
        }
        Ok(rows)
    }
}

/// Byte ranges of the inner content of every `<tag ...>...</tag>` in `lower`.
fn elements(lower: &str, tag: &str) -> Vec<(usize, usize)> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(found) = lower[pos..].find(&open) {
        let tag_start = pos + found;
        let after_name = tag_start + open.len();
        // Reject prefixes of longer tag names (<tr> vs <track>).
        let boundary = lower[after_name..].chars().next();
        if !matches!(boundary, Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('\r')) {
            pos = after_name;
            continue;
        }
        let Some(gt) = lower[after_name..].find('>') else {
            break;
        };
        let content_start = after_name + gt + 1;
        // Unclosed cells end at the next opening tag of the same kind.
        let content_end = match (
            lower[content_start..].find(&close),
            lower[content_start..].find(&open),
        ) {
            (Some(c), Some(o)) => content_start + c.min(o),
            (Some(c), None) => content_start + c,
            (None, Some(o)) => content_start + o,
            (None, None) => lower.len(),
        };
        out.push((content_start, content_end));
        pos = content_end;
    }
    out
}

fn cell_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
