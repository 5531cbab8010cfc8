//! Ranking quality against human relevance judgments.
//!
//! Implements average precision per query and mean average precision (MAP)
//! over a relevance record, the objective used by parameter search.
//!
//! # Formula
//!
//! ```text
//! AP@k  = (1 / R) * Σ precision@i   for each rank i <= k holding a relevant document
//! MAP@k = (1 / Q) * Σ AP@k(q)       over the evaluated queries
//! ```
//!
//! `R` is the number of documents judged relevant for the query. A query with
//! `R = 0` scores exactly 0.0, and MAP over zero queries is 0.0, so the mean is
//! always a finite number.

use crate::error::Result;
use crate::ranker::RankerConfig;
use crate::relevance::RelevanceRecord;
use crate::scoring::{DocId, ScoredDoc, ScoringEngine};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Default number of ranked results considered per query.
pub const DEFAULT_CUTOFF: usize = 10;

/// Average precision of a ranked list over its first `cutoff` entries.
///
/// Returns 0.0 when `relevant` is empty. A document listed more than once in
/// `ranked` only counts at its first position.
pub fn average_precision(ranked: &[ScoredDoc], relevant: &HashSet<&DocId>, cutoff: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }

    let mut seen = HashSet::new();
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (i, doc) in ranked.iter().take(cutoff).enumerate() {
        if !seen.insert(&doc.doc_id) {
            continue;
        }
        if relevant.contains(&doc.doc_id) {
            hits += 1;
            sum += hits as f64 / (i + 1) as f64;
        }
    }

    sum / relevant.len() as f64
}

/// Mean of per-query scores; 0.0 for no queries.
pub fn mean(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Score of a single evaluated query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryScore {
    pub query_number: u32,
    pub query: String,
    /// Number of documents judged relevant.
    pub relevant: usize,
    /// Number of documents the ranker returned.
    pub retrieved: usize,
    pub average_precision: f64,
}

/// Per-query scores and MAP of one ranker configuration.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub ranker: RankerConfig,
    pub cutoff: usize,
    pub queries: Vec<QueryScore>,
    pub map: f64,
}

/// Evaluates ranker configurations against a relevance record.
pub struct Evaluator<'a, E: ScoringEngine> {
    engine: &'a E,
    cutoff: usize,
    query_start: u32,
}

impl<'a, E: ScoringEngine> Evaluator<'a, E> {
    /// Create an evaluator scoring the first `cutoff` results of every query.
    pub fn new(engine: &'a E, cutoff: usize) -> Self {
        Self {
            engine,
            cutoff,
            query_start: 1,
        }
    }

    /// Only evaluate queries numbered `query_start` and above. Earlier
    /// queries are skipped, not renumbered.
    pub fn with_query_start(mut self, query_start: u32) -> Self {
        self.query_start = query_start.max(1);
        self
    }

    pub fn query_start(&self) -> u32 {
        self.query_start
    }

    /// Average precision of a ranked list for one query of the record.
    pub fn average_precision(
        &self,
        record: &RelevanceRecord,
        ranked: &[ScoredDoc],
        query_number: u32,
    ) -> f64 {
        average_precision(ranked, &record.relevant_docs(query_number), self.cutoff)
    }

    /// MAP of a ranker configuration over the record's queries.
    pub fn mean_average_precision(
        &self,
        ranker: &RankerConfig,
        record: &RelevanceRecord,
    ) -> Result<f64> {
        Ok(self.evaluate(ranker, record)?.map)
    }

    /// Score every query in query-number order and collect the results.
    pub fn evaluate(
        &self,
        ranker: &RankerConfig,
        record: &RelevanceRecord,
    ) -> Result<EvaluationReport> {
        let mut queries = Vec::new();
        for (query_number, query) in record.queries_from(self.query_start) {
            let ranked = self.engine.score(ranker, query.trim(), self.cutoff)?;
            let relevant = record.relevant_docs(query_number);
            let ap = average_precision(&ranked, &relevant, self.cutoff);

            debug!(query_number, ap, ranker = %ranker, "scored query");
            queries.push(QueryScore {
                query_number,
                query: query.to_string(),
                relevant: relevant.len(),
                retrieved: ranked.len(),
                average_precision: ap,
            });
        }

        let scores: Vec<f64> = queries.iter().map(|q| q.average_precision).collect();
        Ok(EvaluationReport {
            ranker: *ranker,
            cutoff: self.cutoff,
            map: mean(&scores),
            queries,
        })
    }
}
