//! Rank Tuner - relevance evaluation and ranking-function tuning for post search.
//!
//! Evaluators judge which posts are relevant for the queries they issue. Those
//! judgments are merged into a master record, ranking functions are scored
//! against it with mean average precision, and a coordinate-wise grid search
//! picks parameters for each ranking-function family. At query time the best
//! trained ranker is used to search the post index.
//!
//! # Quick Start
//!
//! ```no_run
//! use rank_tuner::{
//!     config::Config,
//!     context::Context,
//!     scoring::ReplayEngine,
//! };
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let engine = ReplayEngine::from_file(Path::new("runs.json"))?;
//!     let ctx = Context::new(config, engine)?;
//!
//!     // Record a judgment and merge it into the master record
//!     let q = ctx.relevance().record_query("alice", "uiuc housing")?;
//!     ctx.relevance().record_relevant_docs("alice", q, &["doc42".into()])?;
//!     ctx.relevance().merge_into_master("alice", &ctx.config().paths.master_id)?;
//!
//!     // Tune every ranker family on the master record
//!     let master = ctx.master_record()?;
//!     ctx.parameter_search().train_all(master.as_ref())?;
//!
//!     // Search with the best trained ranker
//!     for post in ctx.query("uiuc housing", "best", None, None, Some("upvotes"))? {
//!         println!("{} {}", post.upvotes, post.url);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **RelevanceStore**: per-evaluator queries and relevance judgments
//! - **Evaluator**: average precision and MAP of a ranker configuration
//! - **ParameterSearch**: coordinate-wise grid search, persists the best result
//! - **RankerSelector**: picks the family with the best persisted MAP
//! - **Searcher**: query-time search with time window and sorting
//! - **ScoringEngine**: the external index and scoring primitive

pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod legacy;
pub mod persistence;
pub mod ranker;
pub mod relevance;
pub mod scoring;
pub mod search;
pub mod selector;
pub mod training;

// Re-export commonly used types
pub use config::Config;
pub use context::Context;
pub use error::{RankTunerError, Result};
pub use evaluator::{EvaluationReport, Evaluator, average_precision};
pub use ranker::{RankerConfig, RankerFamily};
pub use relevance::{RelevanceJudgment, RelevanceRecord, RelevanceStore};
pub use scoring::{DocId, DocMetadata, ReplayEngine, ScoredDoc, ScoringEngine};
pub use search::{SearchOptions, SearchResult, Searcher, SortKey, TimeWindow};
pub use selector::RankerSelector;
pub use training::{ParameterGrid, ParameterSearch, TrainingResult, TrainingStore};
