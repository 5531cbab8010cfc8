//! Query-time search over the post index.
//!
//! A search scores the query with the chosen ranker, keeps the top `k`
//! documents, optionally drops documents outside a time window and finally
//! orders what is left by recency or upvotes. The window is applied after
//! truncation, so a narrow window can return fewer than `k` posts.

use crate::error::{RankTunerError, Result};
use crate::ranker::RankerConfig;
use crate::scoring::{DocId, ScoringEngine};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

/// A post returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    /// Post text.
    pub content: String,
    pub url: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub upvotes: i64,
}

impl SearchResult {
    /// Timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
    pub fn formatted_date(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

/// Key results are sorted by, always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Newest first.
    #[default]
    Date,
    /// Most upvoted first.
    Upvotes,
}

impl FromStr for SortKey {
    type Err = RankTunerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "upvotes" => Ok(SortKey::Upvotes),
            other => Err(RankTunerError::InvalidConfig(format!(
                "unknown sort key '{}' (expected 'date' or 'upvotes')",
                other
            ))),
        }
    }
}

/// Inclusive range of Unix timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window from ISO `YYYY-MM-DD` dates, read as UTC midnight.
    ///
    /// The end bound is moved one day forward so posts from any time on the
    /// end date are included.
    pub fn from_dates(start: &str, end: &str) -> Result<Self> {
        let start_day = parse_date(start)?;
        let end_day = parse_date(end)?;
        let end_next = end_day
            .checked_add_days(Days::new(1))
            .ok_or_else(|| RankTunerError::InvalidDate {
                input: end.to_string(),
            })?;

        Ok(Self {
            start: midnight(start_day),
            end: midnight(end_next),
        })
    }

    /// Window from optional date strings; `None` unless both are non-empty.
    pub fn from_optional_dates(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>> {
        match (start, end) {
            (Some(s), Some(e)) if !s.trim().is_empty() && !e.trim().is_empty() => {
                Self::from_dates(s, e).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| RankTunerError::InvalidDate {
        input: input.to_string(),
    })
}

fn midnight(day: NaiveDate) -> i64 {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Search options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of ranked documents to consider.
    pub top_k: usize,
    /// Only keep posts inside this window.
    pub time_window: Option<TimeWindow>,
    pub sort_key: SortKey,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            time_window: None,
            sort_key: SortKey::Date,
        }
    }
}

/// Searches the index through a scoring engine.
pub struct Searcher<'a, E: ScoringEngine> {
    engine: &'a E,
}

impl<'a, E: ScoringEngine> Searcher<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Run a query and return posts ordered by `options.sort_key`.
    ///
    /// Documents the index has no metadata for are skipped.
    pub fn search(
        &self,
        query: &str,
        ranker: &RankerConfig,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let ranked = self.engine.score(ranker, query.trim(), options.top_k)?;
        let retrieved = ranked.len();

        let mut results = Vec::with_capacity(retrieved);
        for scored in ranked.into_iter().take(options.top_k) {
            let Some(meta) = self.engine.metadata(&scored.doc_id)? else {
                warn!(doc_id = %scored.doc_id, "no metadata for ranked document, skipping");
                continue;
            };
            if let Some(window) = &options.time_window {
                if !window.contains(meta.timestamp) {
                    continue;
                }
            }
            results.push(SearchResult {
                doc_id: scored.doc_id,
                content: meta.content,
                url: meta.url,
                timestamp: meta.timestamp,
                upvotes: meta.upvotes,
            });
        }

        // Stable sort: equal keys keep their ranked order.
        match options.sort_key {
            SortKey::Date => results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            SortKey::Upvotes => results.sort_by(|a, b| b.upvotes.cmp(&a.upvotes)),
        }

        debug!(
            query,
            ranker = %ranker,
            retrieved,
            returned = results.len(),
            "search finished"
        );
        Ok(results)
    }
}
