//! End-to-end flow: record judgments, merge, train, select and search.

use rank_tuner::{
    Config, Context, DocMetadata, RankerConfig, RankerFamily, RankTunerError, ReplayEngine,
    ScoredDoc,
};
use tempfile::TempDir;

// 2020-09-01T00:00:00Z
const SEPT_1: i64 = 1_598_918_400;
const DAY: i64 = 86_400;

fn post(content: &str, timestamp: i64, upvotes: i64) -> DocMetadata {
    DocMetadata {
        content: content.to_string(),
        url: format!("https://reddit.com/r/UIUC/comments/{}", timestamp),
        timestamp,
        upvotes,
    }
}

/// Default rankings put the relevant post second; BM25 with k1 = 0.8 and
/// Jelinek-Mercer with lambda = 0.4 put it first.
fn engine() -> ReplayEngine {
    let housing_default = vec![ScoredDoc::new("doc7", 2.0), ScoredDoc::new("doc42", 1.0)];
    let housing_tuned = vec![ScoredDoc::new("doc42", 2.0), ScoredDoc::new("doc7", 1.0)];
    let bm25_tuned = RankerConfig::OkapiBm25 {
        k1: 0.8,
        b: 0.75,
        k3: 500.0,
    };
    let jm_tuned = RankerConfig::JelinekMercer { lambda: 0.4 };

    ReplayEngine::new()
        .with_document("doc42", post("Any leads on housing near campus?", SEPT_1, 40))
        .with_document("doc7", post("Housing fair this weekend", SEPT_1 + 5 * DAY, 3))
        .with_document("doc9", post("Best study spots in Grainger", SEPT_1 + DAY, 17))
        .with_ranking("uiuc housing", housing_default)
        .with_ranking("grainger study", vec![ScoredDoc::new("doc9", 1.0)])
        .with_ranking_for(&bm25_tuned, "uiuc housing", housing_tuned.clone())
        .with_ranking_for(&jm_tuned, "uiuc housing", housing_tuned)
}

fn context(dir: &TempDir) -> Context<ReplayEngine> {
    let mut config = Config::default();
    config.paths.evaluation_dir = dir.path().join("evaluation");
    config.paths.training_dir = dir.path().join("training");
    Context::new(config, engine()).unwrap()
}

#[test]
fn test_full_pipeline() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let store = ctx.relevance();
    let master = ctx.config().paths.master_id.clone();

    let q = store.record_query("alice", "uiuc housing").unwrap();
    store
        .record_relevant_docs("alice", q, &["doc42".into()])
        .unwrap();
    let q = store.record_query("bob", "grainger study").unwrap();
    store.record_relevant_docs("bob", q, &["doc9".into()]).unwrap();

    store.merge_into_master("alice", &master).unwrap();
    let merged = store.merge_into_master("bob", &master).unwrap();
    assert_eq!(merged.query_count, 2);
    assert_eq!(merged.relevant_docs(2).len(), 1);

    // Untuned: housing AP 0.5, grainger AP 1.0.
    let record = ctx.master_record().unwrap().unwrap();
    let untuned = ctx
        .evaluator()
        .mean_average_precision(&RankerConfig::default(), &record)
        .unwrap();
    assert!((untuned - 0.75).abs() < 1e-12);

    // Nothing trained yet: the default ranker is selected.
    assert_eq!(ctx.selector().best_ranker().unwrap(), RankerConfig::default());

    let results = ctx.parameter_search().train_all(Some(&record)).unwrap();
    assert_eq!(results.len(), 2);
    let bm25 = results[0];
    let jm = results[1];
    assert_eq!(bm25.map, 1.0);
    assert_eq!(bm25.ranker.param("k1"), Some(0.8));
    assert_eq!(jm.map, 1.0);
    assert_eq!(jm.ranker.param("lambda"), Some(0.4));

    // Equal MAP: BM25 is declared first and wins the tie.
    assert_eq!(ctx.selector().best_ranker().unwrap(), bm25.ranker);
    assert_eq!(ctx.selector().load("jm").unwrap(), Some(jm.ranker));
    assert_eq!(ctx.selector().load("nonsense").unwrap(), None);

    // With the tuned ranker the relevant post is ranked first; date order
    // still puts the newer post on top.
    let posts = ctx
        .query("uiuc housing", "best", None, None, Some("date"))
        .unwrap();
    let ids: Vec<_> = posts.iter().map(|p| p.doc_id.as_str()).collect();
    assert_eq!(ids, vec!["doc7", "doc42"]);

    let posts = ctx
        .query(
            "uiuc housing",
            "best",
            Some("2020-09-01"),
            Some("2020-09-02"),
            Some("upvotes"),
        )
        .unwrap();
    let ids: Vec<_> = posts.iter().map(|p| p.doc_id.as_str()).collect();
    assert_eq!(ids, vec!["doc42"]);
}

#[test]
fn test_training_without_judgments_fails() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    let master = ctx.master_record().unwrap();
    assert!(master.is_none());
    let result = ctx.parameter_search().search(
        RankerFamily::OkapiBm25,
        &rank_tuner::training::default_grids(RankerFamily::OkapiBm25),
        master.as_ref(),
    );
    assert!(matches!(result, Err(RankTunerError::DataUnavailable(_))));
    assert!(ctx.training().load(RankerFamily::OkapiBm25).unwrap().is_none());
}
