//! Import of line-based judgment files written by the older collector.
//!
//! The older collector kept two text files per evaluator:
//!
//! - `<id>_queries.txt`: line 1 is the query count, then one query per line.
//!   The merged master file has no count line.
//! - `<id>_evals.txt`: lines of the form `<query_number> <doc_id> 1`.
//!
//! Both are parsed strictly into a [`RelevanceRecord`]; any deviation is
//! reported as corrupt state rather than skipped.

use crate::error::{RankTunerError, Result};
use crate::persistence::PersistedRecord;
use crate::relevance::{RelevanceJudgment, RelevanceRecord};
use crate::scoring::DocId;
use std::path::Path;
use tracing::info;

/// Layout of a legacy query file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFileLayout {
    /// First line holds the number of queries (per-evaluator files).
    Counted,
    /// Every line is a query (merged master files).
    Plain,
}

/// Read a legacy query file and judgment file into a record.
///
/// A missing judgment file is read as "no judgments yet".
pub fn import_legacy(
    evaluator: &str,
    queries_path: &Path,
    evals_path: &Path,
    layout: QueryFileLayout,
) -> Result<RelevanceRecord> {
    if !queries_path.exists() {
        return Err(RankTunerError::DataUnavailable(format!(
            "query file '{}' does not exist",
            queries_path.display()
        )));
    }
    let queries_text =
        std::fs::read_to_string(queries_path).map_err(|e| RankTunerError::io(queries_path, e))?;
    let evals_text = if evals_path.exists() {
        std::fs::read_to_string(evals_path).map_err(|e| RankTunerError::io(evals_path, e))?
    } else {
        String::new()
    };

    let mut record = RelevanceRecord::new(evaluator);
    let queries = parse_queries(&queries_text, layout)
        .map_err(|r| RankTunerError::corrupt(queries_path, r))?;
    for query in queries {
        record.push_query(query);
    }
    record.judgments =
        parse_judgments(&evals_text).map_err(|r| RankTunerError::corrupt(evals_path, r))?;
    record
        .validate()
        .map_err(|r| RankTunerError::corrupt(evals_path, r))?;

    info!(
        evaluator,
        queries = record.query_count,
        judgments = record.judgments.len(),
        "imported legacy judgment files"
    );
    Ok(record)
}

fn parse_queries(text: &str, layout: QueryFileLayout) -> std::result::Result<Vec<String>, String> {
    let mut lines = text.lines();
    let queries: Vec<String> = match layout {
        QueryFileLayout::Plain => lines.map(str::to_string).collect(),
        QueryFileLayout::Counted => {
            let header = lines
                .next()
                .ok_or_else(|| "missing query count on line 1".to_string())?;
            let count: usize = header
                .trim()
                .parse()
                .map_err(|_| format!("line 1: query count '{}' is not a number", header.trim()))?;
            let queries: Vec<String> = lines.map(str::to_string).collect();
            if queries.len() != count {
                return Err(format!(
                    "line 1 declares {} queries but {} follow",
                    count,
                    queries.len()
                ));
            }
            queries
        }
    };
    Ok(queries)
}

fn parse_judgments(text: &str) -> std::result::Result<Vec<RelevanceJudgment>, String> {
    let mut judgments = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [query, doc, relevance] = fields.as_slice() else {
            return Err(format!(
                "line {}: expected '<query_number> <doc_id> 1', got '{}'",
                line_no, line
            ));
        };
        let query_number: u32 = query
            .parse()
            .map_err(|_| format!("line {}: invalid query number '{}'", line_no, query))?;
        let relevance: u8 = relevance
            .parse()
            .map_err(|_| format!("line {}: invalid relevance '{}'", line_no, relevance))?;

        judgments.push(RelevanceJudgment {
            query_number,
            doc_id: DocId::from(*doc),
            relevance,
        });
    }
    Ok(judgments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_import_counted() {
        let dir = TempDir::new().unwrap();
        let queries = write(&dir, "alice_queries.txt", "2\nuiuc housing\ncs 225 exam\n");
        let evals = write(&dir, "alice_evals.txt", "1 42 1\n2 7 1\n2 9 1\n");

        let record = import_legacy("alice", &queries, &evals, QueryFileLayout::Counted).unwrap();
        assert_eq!(record.query_count, 2);
        assert_eq!(record.query(1), Some("uiuc housing"));
        assert_eq!(record.judgments.len(), 3);
        assert_eq!(record.judgments[0], RelevanceJudgment::relevant(1, "42"));
    }

    #[test]
    fn test_import_plain_master() {
        let dir = TempDir::new().unwrap();
        let queries = write(&dir, "uiuc_queries.txt", "parking\nuiuc housing\n");
        let evals = write(&dir, "uiuc_evals.txt", "2 42 1\n");

        let record = import_legacy("uiuc", &queries, &evals, QueryFileLayout::Plain).unwrap();
        assert_eq!(record.query_count, 2);
        assert_eq!(record.relevant_docs(2).len(), 1);
    }

    #[test]
    fn test_import_missing_evals() {
        let dir = TempDir::new().unwrap();
        let queries = write(&dir, "alice_queries.txt", "1\nuiuc housing\n");
        let record = import_legacy(
            "alice",
            &queries,
            &dir.path().join("alice_evals.txt"),
            QueryFileLayout::Counted,
        )
        .unwrap();
        assert!(record.judgments.is_empty());
    }

    #[test]
    fn test_import_missing_queries() {
        let dir = TempDir::new().unwrap();
        let result = import_legacy(
            "alice",
            &dir.path().join("alice_queries.txt"),
            &dir.path().join("alice_evals.txt"),
            QueryFileLayout::Counted,
        );
        assert!(matches!(result, Err(RankTunerError::DataUnavailable(_))));
    }

    #[test]
    fn test_import_count_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let queries = write(&dir, "alice_queries.txt", "3\nuiuc housing\n");
        let evals = write(&dir, "alice_evals.txt", "");
        let result = import_legacy("alice", &queries, &evals, QueryFileLayout::Counted);
        assert!(matches!(
            result,
            Err(RankTunerError::CorruptPersistedState { .. })
        ));
    }

    #[test]
    fn test_import_bad_judgment_line_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let queries = write(&dir, "alice_queries.txt", "1\nuiuc housing\n");

        for bad in ["x 42 1\n", "1 42\n", "1 42 yes\n", "5 42 1\n"] {
            let evals = write(&dir, "alice_evals.txt", bad);
            let result = import_legacy("alice", &queries, &evals, QueryFileLayout::Counted);
            assert!(
                matches!(result, Err(RankTunerError::CorruptPersistedState { .. })),
                "expected corrupt state for {:?}",
                bad
            );
        }
    }
}
