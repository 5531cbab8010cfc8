//! Process-wide context shared by every operation.
//!
//! A [`Context`] is built once at startup from the configuration and the
//! scoring engine, and hands out the stores and components that operate on
//! them. Nothing here is global; dropping the context releases everything.

use crate::config::Config;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::ranker::RankerConfig;
use crate::relevance::{RelevanceRecord, RelevanceStore};
use crate::scoring::ScoringEngine;
use crate::search::{SearchOptions, SearchResult, Searcher, SortKey, TimeWindow};
use crate::selector::RankerSelector;
use crate::training::{ParameterSearch, TrainingStore};
use tracing::warn;

/// Configuration, engine and stores for one process.
pub struct Context<E: ScoringEngine> {
    config: Config,
    engine: E,
    relevance: RelevanceStore,
    training: TrainingStore,
}

impl<E: ScoringEngine> Context<E> {
    /// Validate the configuration and build the context.
    pub fn new(config: Config, engine: E) -> Result<Self> {
        config.validate()?;
        let relevance =
            RelevanceStore::new(config.paths.evaluation_dir.clone(), config.storage.format);
        let training = TrainingStore::new(config.paths.training_dir.clone(), config.storage.format);
        Ok(Self {
            config,
            engine,
            relevance,
            training,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn relevance(&self) -> &RelevanceStore {
        &self.relevance
    }

    pub fn training(&self) -> &TrainingStore {
        &self.training
    }

    /// Evaluator using the configured cutoff and first query.
    pub fn evaluator(&self) -> Evaluator<'_, E> {
        Evaluator::new(&self.engine, self.config.evaluation.cutoff)
            .with_query_start(self.config.evaluation.query_start)
    }

    pub fn parameter_search(&self) -> ParameterSearch<'_, E> {
        ParameterSearch::new(self.evaluator(), self.training.clone())
    }

    pub fn selector(&self) -> RankerSelector {
        RankerSelector::new(self.training.clone())
    }

    pub fn searcher(&self) -> Searcher<'_, E> {
        Searcher::new(&self.engine)
    }

    /// The shared master relevance record, if any evaluator has been merged.
    pub fn master_record(&self) -> Result<Option<RelevanceRecord>> {
        self.relevance.load(&self.config.paths.master_id)
    }

    /// Resolve a ranker identifier, falling back to the default ranker when
    /// nothing is available for it.
    pub fn resolve_ranker(&self, identifier: &str) -> Result<RankerConfig> {
        match self.selector().load(identifier)? {
            Some(ranker) => Ok(ranker),
            None => {
                warn!(identifier, "no ranker available, using default");
                Ok(RankerConfig::default())
            }
        }
    }

    /// Answer a front-end query: optional ISO date window and sort key name.
    pub fn query(
        &self,
        query: &str,
        ranker_id: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
        sort: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let ranker = self.resolve_ranker(ranker_id)?;
        let sort_key = match sort {
            Some(name) => name.parse::<SortKey>()?,
            None => self.config.search.sort,
        };
        let options = SearchOptions {
            top_k: self.config.search.top_k,
            time_window: TimeWindow::from_optional_dates(start_date, end_date)?,
            sort_key,
        };
        self.searcher().search(query, &ranker, &options)
    }
}
