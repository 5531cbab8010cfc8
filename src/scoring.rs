//! The scoring primitive supplied by the external index library.
//!
//! The tuner never scores documents itself. It asks a [`ScoringEngine`] for a
//! ranked list under a given [`RankerConfig`] and looks up post metadata by id.
//! [`ReplayEngine`] is a deterministic implementation that replays rankings
//! captured in a JSON run file; it backs the command-line tool and the tests.

use crate::error::{RankTunerError, Result};
use crate::ranker::RankerConfig;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Identifier of a document (post) in the index.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

impl ScoredDoc {
    pub fn new(doc_id: impl Into<DocId>, score: f64) -> Self {
        Self {
            doc_id: doc_id.into(),
            score,
        }
    }
}

/// Stored metadata of a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub content: String,
    pub url: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub upvotes: i64,
}

/// Capability interface over the external index and scoring library.
pub trait ScoringEngine {
    /// Rank documents for `query` with the given ranking function, best first,
    /// returning at most `top_k` entries.
    fn score(&self, ranker: &RankerConfig, query: &str, top_k: usize) -> Result<Vec<ScoredDoc>>;

    /// Metadata for a document, or `None` if the index has no such document.
    fn metadata(&self, doc_id: &DocId) -> Result<Option<DocMetadata>>;
}

/// Contents of a replay run file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFile {
    /// Post metadata keyed by document id.
    #[serde(default)]
    pub documents: HashMap<DocId, DocMetadata>,
    /// Rankings used for any ranker, keyed by query text.
    #[serde(default)]
    pub rankings: HashMap<String, Vec<ScoredDoc>>,
    /// Rankings for one specific configuration, keyed by
    /// [`RankerConfig::label`] and then by query text.
    #[serde(default)]
    pub configured: HashMap<String, HashMap<String, Vec<ScoredDoc>>>,
}

/// Scoring engine that replays pre-computed rankings.
#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    runs: RunFile,
}

impl ReplayEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON run file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RankTunerError::io(path, e))?;
        let runs: RunFile = serde_json::from_str(&content)
            .map_err(|e| RankTunerError::corrupt(path, format!("invalid run file: {}", e)))?;
        Ok(Self { runs })
    }

    /// Add a document's metadata.
    pub fn with_document(mut self, doc_id: impl Into<DocId>, metadata: DocMetadata) -> Self {
        self.runs.documents.insert(doc_id.into(), metadata);
        self
    }

    /// Set the ranking returned for `query` under every ranker.
    pub fn with_ranking(mut self, query: &str, ranking: Vec<ScoredDoc>) -> Self {
        self.runs.rankings.insert(normalize(query), ranking);
        self
    }

    /// Set the ranking returned for `query` under one specific configuration.
    pub fn with_ranking_for(
        mut self,
        ranker: &RankerConfig,
        query: &str,
        ranking: Vec<ScoredDoc>,
    ) -> Self {
        self.runs
            .configured
            .entry(ranker.label())
            .or_default()
            .insert(normalize(query), ranking);
        self
    }

    /// Number of documents with metadata.
    pub fn document_count(&self) -> usize {
        self.runs.documents.len()
    }
}

impl ScoringEngine for ReplayEngine {
    fn score(&self, ranker: &RankerConfig, query: &str, top_k: usize) -> Result<Vec<ScoredDoc>> {
        let key = normalize(query);
        let ranking = self
            .runs
            .configured
            .get(&ranker.label())
            .and_then(|by_query| by_query.get(&key))
            .or_else(|| self.runs.rankings.get(&key));

        let mut ranked = ranking.cloned().unwrap_or_default();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k);
        Ok(ranked)
    }

    fn metadata(&self, doc_id: &DocId) -> Result<Option<DocMetadata>> {
        Ok(self.runs.documents.get(doc_id).cloned())
    }
}

fn normalize(query: &str) -> String {
    query.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranker::RankerFamily;
    use tempfile::TempDir;

    #[test]
    fn test_replay_default_ranking() {
        let engine = ReplayEngine::new().with_ranking(
            "uiuc housing",
            vec![ScoredDoc::new("doc7", 0.5), ScoredDoc::new("doc42", 0.9)],
        );

        let ranked = engine
            .score(&RankerConfig::default(), "  uiuc housing ", 10)
            .unwrap();
        let ids: Vec<_> = ranked.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["doc42", "doc7"]);
    }

    #[test]
    fn test_replay_truncates_to_top_k() {
        let engine = ReplayEngine::new().with_ranking(
            "q",
            vec![
                ScoredDoc::new("a", 3.0),
                ScoredDoc::new("b", 2.0),
                ScoredDoc::new("c", 1.0),
            ],
        );
        let ranked = engine.score(&RankerConfig::default(), "q", 2).unwrap();
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_replay_configured_ranking_takes_precedence() {
        let tuned = RankerConfig::default().with_param("k1", 0.5).unwrap();
        let engine = ReplayEngine::new()
            .with_ranking("q", vec![ScoredDoc::new("a", 1.0)])
            .with_ranking_for(&tuned, "q", vec![ScoredDoc::new("b", 1.0)]);

        let default = engine.score(&RankerConfig::default(), "q", 10).unwrap();
        assert_eq!(default[0].doc_id.as_str(), "a");

        let configured = engine.score(&tuned, "q", 10).unwrap();
        assert_eq!(configured[0].doc_id.as_str(), "b");

        let other = RankerFamily::JelinekMercer.default_config();
        assert_eq!(engine.score(&other, "q", 10).unwrap()[0].doc_id.as_str(), "a");
    }

    #[test]
    fn test_unknown_query_is_empty() {
        let engine = ReplayEngine::new();
        assert!(engine
            .score(&RankerConfig::default(), "nothing", 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs.json");
        std::fs::write(
            &path,
            r#"{
                "documents": {
                    "doc42": {"content": "Looking for housing", "url": "https://example.com/42", "timestamp": 1600000000, "upvotes": 12}
                },
                "rankings": {
                    "uiuc housing": [{"doc_id": "doc42", "score": 0.9}]
                }
            }"#,
        )
        .unwrap();

        let engine = ReplayEngine::from_file(&path).unwrap();
        assert_eq!(engine.document_count(), 1);
        let meta = engine.metadata(&DocId::from("doc42")).unwrap().unwrap();
        assert_eq!(meta.upvotes, 12);
        assert!(engine.metadata(&DocId::from("doc7")).unwrap().is_none());
    }

    #[test]
    fn test_from_file_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ReplayEngine::from_file(&path),
            Err(RankTunerError::CorruptPersistedState { .. })
        ));
    }
}
