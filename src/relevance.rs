//! Durable relevance judgments, one record per evaluator.
//!
//! Each evaluator identity owns a [`RelevanceRecord`]: the queries they issued,
//! numbered from 1, and the documents they confirmed as relevant for each
//! query. Records from individual evaluators are merged into a shared master
//! record, which is what training and evaluation read.

use crate::error::{RankTunerError, Result};
use crate::persistence::{PersistedRecord, RECORD_VERSION, SaveFormat, load_record, save_record};
use crate::scoring::DocId;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Suffix of relevance record file names, before the extension.
const RECORD_SUFFIX: &str = "_relevance";

/// A confirmed-relevant document for a query.
///
/// Only positive judgments are stored: a document without a judgment is
/// "not confirmed relevant", not "irrelevant".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct RelevanceJudgment {
    /// 1-based query number within the owning record.
    pub query_number: u32,
    pub doc_id: DocId,
    /// Relevance grade; always 1.
    pub relevance: u8,
}

impl RelevanceJudgment {
    /// Create a binary "relevant" judgment.
    pub fn relevant(query_number: u32, doc_id: impl Into<DocId>) -> Self {
        Self {
            query_number,
            doc_id: doc_id.into(),
            relevance: 1,
        }
    }
}

/// Queries and judgments of one evaluator (or of the master record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct RelevanceRecord {
    pub version: u32,
    pub evaluator: String,
    /// Number of queries; always equal to `queries.len()`.
    pub query_count: u32,
    /// Query texts; query number `n` is `queries[n - 1]`.
    pub queries: Vec<String>,
    pub judgments: Vec<RelevanceJudgment>,
}

impl RelevanceRecord {
    /// Create an empty record.
    pub fn new(evaluator: impl Into<String>) -> Self {
        Self {
            version: RECORD_VERSION,
            evaluator: evaluator.into(),
            query_count: 0,
            queries: Vec::new(),
            judgments: Vec::new(),
        }
    }

    /// Append a query and return its number.
    pub fn push_query(&mut self, query: impl Into<String>) -> u32 {
        self.queries.push(query.into());
        self.query_count += 1;
        self.query_count
    }

    /// Append one judgment per document for an existing query.
    pub fn add_judgments(&mut self, query_number: u32, doc_ids: &[DocId]) -> Result<()> {
        if doc_ids.is_empty() {
            return Ok(());
        }
        if !self.has_query(query_number) {
            return Err(RankTunerError::UnknownQuery {
                evaluator: self.evaluator.clone(),
                query_number,
            });
        }
        self.judgments.extend(
            doc_ids
                .iter()
                .map(|doc| RelevanceJudgment::relevant(query_number, doc.clone())),
        );
        Ok(())
    }

    /// Whether the record contains the given query number.
    pub fn has_query(&self, query_number: u32) -> bool {
        query_number >= 1 && query_number <= self.query_count
    }

    /// Text of a query by number.
    pub fn query(&self, query_number: u32) -> Option<&str> {
        if !self.has_query(query_number) {
            return None;
        }
        self.queries
            .get(query_number as usize - 1)
            .map(String::as_str)
    }

    /// Queries with their numbers, starting at `start` (1-based).
    pub fn queries_from(&self, start: u32) -> impl Iterator<Item = (u32, &str)> {
        self.queries
            .iter()
            .enumerate()
            .map(|(i, q)| (i as u32 + 1, q.as_str()))
            .skip_while(move |(n, _)| *n < start)
    }

    /// Documents judged relevant for a query.
    pub fn relevant_docs(&self, query_number: u32) -> HashSet<&DocId> {
        self.judgments
            .iter()
            .filter(|j| j.query_number == query_number && j.relevance > 0)
            .map(|j| &j.doc_id)
            .collect()
    }

    /// Append another record's queries and judgments to this one.
    ///
    /// Judgments are re-numbered by this record's query count as it was
    /// before the append. Returns that offset.
    pub fn append(&mut self, other: &RelevanceRecord) -> u32 {
        let offset = self.query_count;

        self.queries.extend(other.queries.iter().cloned());
        self.query_count += other.query_count;
        self.judgments
            .extend(other.judgments.iter().map(|j| RelevanceJudgment {
                query_number: j.query_number + offset,
                doc_id: j.doc_id.clone(),
                relevance: j.relevance,
            }));

        offset
    }
}

impl PersistedRecord for RelevanceRecord {
    fn version(&self) -> u32 {
        self.version
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.query_count as usize != self.queries.len() {
            return Err(format!(
                "query count {} does not match {} stored queries",
                self.query_count,
                self.queries.len()
            ));
        }
        for judgment in &self.judgments {
            if !self.has_query(judgment.query_number) {
                return Err(format!(
                    "judgment for document '{}' references missing query {}",
                    judgment.doc_id, judgment.query_number
                ));
            }
            if judgment.relevance != 1 {
                return Err(format!(
                    "judgment for document '{}' has relevance {} (expected 1)",
                    judgment.doc_id, judgment.relevance
                ));
            }
        }
        Ok(())
    }
}

/// File-backed store of relevance records.
#[derive(Debug, Clone)]
pub struct RelevanceStore {
    dir: PathBuf,
    format: SaveFormat,
}

impl RelevanceStore {
    /// Create a store rooted at `dir`. Nothing is written until the first record.
    pub fn new(dir: impl Into<PathBuf>, format: SaveFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of an evaluator's record.
    pub fn path_for(&self, evaluator: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}.{}",
            evaluator,
            RECORD_SUFFIX,
            self.format.extension()
        ))
    }

    /// Load an evaluator's record, `None` if they have not recorded anything.
    pub fn load(&self, evaluator: &str) -> Result<Option<RelevanceRecord>> {
        check_evaluator_id(evaluator)?;
        let record: Option<RelevanceRecord> = load_record(&self.path_for(evaluator))?;
        if let Some(record) = &record {
            if record.evaluator != evaluator {
                return Err(RankTunerError::corrupt(
                    self.path_for(evaluator),
                    format!(
                        "record belongs to evaluator '{}', not '{}'",
                        record.evaluator, evaluator
                    ),
                ));
            }
        }
        Ok(record)
    }

    /// Write an evaluator's record.
    pub fn save(&self, record: &RelevanceRecord) -> Result<()> {
        check_evaluator_id(&record.evaluator)?;
        save_record(record, &self.path_for(&record.evaluator))
    }

    /// Append a query for an evaluator and return its query number.
    pub fn record_query(&self, evaluator: &str, query: &str) -> Result<u32> {
        let mut record = self
            .load(evaluator)?
            .unwrap_or_else(|| RelevanceRecord::new(evaluator));
        let query_number = record.push_query(query);
        self.save(&record)?;

        debug!(evaluator, query_number, "recorded query");
        Ok(query_number)
    }

    /// Record documents judged relevant for one of the evaluator's queries.
    pub fn record_relevant_docs(
        &self,
        evaluator: &str,
        query_number: u32,
        doc_ids: &[DocId],
    ) -> Result<()> {
        if doc_ids.is_empty() {
            return Ok(());
        }

        let mut record = self
            .load(evaluator)?
            .ok_or_else(|| RankTunerError::UnknownQuery {
                evaluator: evaluator.to_string(),
                query_number,
            })?;
        record.add_judgments(query_number, doc_ids)?;
        self.save(&record)?;

        debug!(
            evaluator,
            query_number,
            count = doc_ids.len(),
            "recorded relevant documents"
        );
        Ok(())
    }

    /// Append an evaluator's queries and judgments to the master record.
    ///
    /// Not idempotent: merging the same evaluator twice duplicates its data.
    pub fn merge_into_master(&self, evaluator: &str, master: &str) -> Result<RelevanceRecord> {
        if evaluator == master {
            return Err(RankTunerError::InvalidConfig(format!(
                "cannot merge '{}' into itself",
                master
            )));
        }

        let source = self.load(evaluator)?.ok_or_else(|| {
            RankTunerError::DataUnavailable(format!(
                "no relevance record for evaluator '{}'",
                evaluator
            ))
        })?;
        let mut target = self
            .load(master)?
            .unwrap_or_else(|| RelevanceRecord::new(master));

        let offset = target.append(&source);
        self.save(&target)?;

        info!(
            evaluator,
            master,
            offset,
            queries = source.query_count,
            judgments = source.judgments.len(),
            "merged relevance record"
        );
        Ok(target)
    }

    /// Evaluator ids that have a record in the store directory, sorted.
    pub fn list_evaluators(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let suffix = format!("{}.{}", RECORD_SUFFIX, self.format.extension());
        let mut evaluators = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.dir.clone());
                RankTunerError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = name.strip_suffix(&suffix) {
                    if !id.is_empty() {
                        evaluators.push(id.to_string());
                    }
                }
            }
        }
        evaluators.sort();
        Ok(evaluators)
    }
}

/// Evaluator ids become file names, so they must be plain names.
pub(crate) fn check_evaluator_id(evaluator: &str) -> Result<()> {
    let valid = !evaluator.is_empty()
        && evaluator
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && evaluator != "."
        && evaluator != "..";
    if valid {
        Ok(())
    } else {
        Err(RankTunerError::InvalidConfig(format!(
            "invalid evaluator id '{}'",
            evaluator
        )))
    }
}
