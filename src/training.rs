//! Coordinate-wise grid search over ranking-function parameters.
//!
//! Parameters of a family are tuned one at a time, in the family's declared
//! order, holding the others at their best value so far. The search starts from
//! the family's default configuration and only moves to a candidate value when
//! it scores a strictly higher MAP, so ties keep the earlier value.
//!
//! The search makes a single pass over the parameters. It is not iterated to
//! convergence and does not explore parameter combinations jointly, so the
//! result can be a coordinate-wise optimum rather than the grid optimum.

use crate::error::{RankTunerError, Result};
use crate::evaluator::Evaluator;
use crate::persistence::{PersistedRecord, RECORD_VERSION, SaveFormat, load_record, save_record};
use crate::ranker::{RankerConfig, RankerFamily};
use crate::relevance::RelevanceRecord;
use crate::scoring::ScoringEngine;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Candidate values for one parameter, scanned in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    pub name: String,
    pub candidates: Vec<f64>,
}

impl ParameterGrid {
    pub fn new(name: impl Into<String>, candidates: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            candidates,
        }
    }
}

/// `from / 10 ..= to / 10` in steps of 0.1.
fn tenths(from: u32, to: u32) -> Vec<f64> {
    (from..=to).map(|x| x as f64 / 10.0).collect()
}

/// Grids used when tuning a family without explicit grids.
pub fn default_grids(family: RankerFamily) -> Vec<ParameterGrid> {
    match family {
        RankerFamily::OkapiBm25 => vec![
            ParameterGrid::new("k1", tenths(1, 20)),
            ParameterGrid::new("b", tenths(1, 20)),
            ParameterGrid::new("k3", (0..=10).map(|x| x as f64 * 100.0).collect()),
        ],
        RankerFamily::JelinekMercer => vec![ParameterGrid::new("lambda", tenths(1, 9))],
    }
}

/// Best MAP found for a family and the configuration that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingResult {
    pub map: f64,
    pub ranker: RankerConfig,
}

impl TrainingResult {
    pub fn family(&self) -> RankerFamily {
        self.ranker.family()
    }
}

/// On-disk form of a [`TrainingResult`].
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
struct TrainingRecord {
    version: u32,
    family: RankerFamily,
    map: f64,
    ranker: RankerConfig,
    /// Number of queries the MAP was computed over.
    queries: u32,
}

impl PersistedRecord for TrainingRecord {
    fn version(&self) -> u32 {
        self.version
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.map.is_finite() || !(0.0..=1.0).contains(&self.map) {
            return Err(format!("MAP {} is outside [0, 1]", self.map));
        }
        if self.ranker.family() != self.family {
            return Err(format!(
                "record for family '{}' holds a '{}' ranker",
                self.family,
                self.ranker.family()
            ));
        }
        self.ranker.validate()
    }
}

/// File-backed store of the best training result per family.
#[derive(Debug, Clone)]
pub struct TrainingStore {
    dir: PathBuf,
    format: SaveFormat,
}

impl TrainingStore {
    pub fn new(dir: impl Into<PathBuf>, format: SaveFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a family's training record.
    pub fn path_for(&self, family: RankerFamily) -> PathBuf {
        self.dir
            .join(format!("{}_ranker.{}", family.id(), self.format.extension()))
    }

    /// Load a family's result, `None` if it has never been trained.
    pub fn load(&self, family: RankerFamily) -> Result<Option<TrainingResult>> {
        let path = self.path_for(family);
        let record: Option<TrainingRecord> = load_record(&path)?;
        match record {
            Some(record) if record.family != family => Err(RankTunerError::corrupt(
                path,
                format!("expected family '{}', found '{}'", family, record.family),
            )),
            Some(record) => Ok(Some(TrainingResult {
                map: record.map,
                ranker: record.ranker,
            })),
            None => Ok(None),
        }
    }

    /// Store a result, replacing any previous result for its family.
    pub fn save(&self, result: &TrainingResult, queries: u32) -> Result<()> {
        let record = TrainingRecord {
            version: RECORD_VERSION,
            family: result.family(),
            map: result.map,
            ranker: result.ranker,
            queries,
        };
        save_record(&record, &self.path_for(result.family()))
    }
}

/// MAP of one evaluated configuration during a search.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    /// Parameter being scanned, or `None` for the starting configuration.
    pub parameter: Option<String>,
    pub ranker: RankerConfig,
    pub map: f64,
    /// Whether this candidate became the new best.
    pub committed: bool,
    /// Best MAP after considering this candidate.
    pub best_map: f64,
}

/// Grid search driver using [`Evaluator`] as the objective.
pub struct ParameterSearch<'a, E: ScoringEngine> {
    evaluator: Evaluator<'a, E>,
    store: TrainingStore,
}

impl<'a, E: ScoringEngine> ParameterSearch<'a, E> {
    pub fn new(evaluator: Evaluator<'a, E>, store: TrainingStore) -> Self {
        Self { evaluator, store }
    }

    /// Tune one family and persist the best result.
    ///
    /// Fails with `DataUnavailable` when there is no record or it holds no
    /// queries to evaluate.
    pub fn search(
        &self,
        family: RankerFamily,
        grids: &[ParameterGrid],
        record: Option<&RelevanceRecord>,
    ) -> Result<TrainingResult> {
        self.search_traced(family, grids, record)
            .map(|(result, _)| result)
    }

    /// Like [`search`](Self::search), also returning every evaluated candidate.
    pub fn search_traced(
        &self,
        family: RankerFamily,
        grids: &[ParameterGrid],
        record: Option<&RelevanceRecord>,
    ) -> Result<(TrainingResult, Vec<CandidateScore>)> {
        let record = record.ok_or_else(|| {
            RankTunerError::DataUnavailable("no relevance record to train on".to_string())
        })?;
        let query_count = record.queries_from(self.evaluator.query_start()).count();
        if query_count == 0 {
            return Err(RankTunerError::DataUnavailable(format!(
                "relevance record '{}' has no queries to train on",
                record.evaluator
            )));
        }
        let grids = ordered_grids(family, grids)?;

        let mut best = family.default_config();
        let mut best_map = self.evaluator.mean_average_precision(&best, record)?;
        let mut trace = vec![CandidateScore {
            parameter: None,
            ranker: best,
            map: best_map,
            committed: true,
            best_map,
        }];
        info!(family = %family, map = best_map, queries = query_count, "starting parameter search");

        for grid in grids {
            for &candidate in &grid.candidates {
                let ranker = best.with_param(&grid.name, candidate)?;
                let map = self.evaluator.mean_average_precision(&ranker, record)?;

                // Strictly greater: ties keep the value already held.
                let committed = map > best_map;
                if committed {
                    best = ranker;
                    best_map = map;
                }
                debug!(
                    parameter = %grid.name,
                    value = candidate,
                    map,
                    committed,
                    "evaluated candidate"
                );
                trace.push(CandidateScore {
                    parameter: Some(grid.name.clone()),
                    ranker,
                    map,
                    committed,
                    best_map,
                });
            }
            info!(
                parameter = %grid.name,
                value = best.param(&grid.name).unwrap_or_default(),
                map = best_map,
                "parameter tuned"
            );
        }

        let result = TrainingResult {
            map: best_map,
            ranker: best,
        };
        self.store.save(&result, query_count as u32)?;
        info!(ranker = %result.ranker, map = result.map, "saved training result");

        Ok((result, trace))
    }

    /// Tune every family with its default grids, in declared order.
    pub fn train_all(&self, record: Option<&RelevanceRecord>) -> Result<Vec<TrainingResult>> {
        RankerFamily::ALL
            .iter()
            .map(|&family| self.search(family, &default_grids(family), record))
            .collect()
    }
}

/// Check grids against the family and put them in declared parameter order.
fn ordered_grids(family: RankerFamily, grids: &[ParameterGrid]) -> Result<Vec<ParameterGrid>> {
    let names = family.parameter_names();
    for (i, grid) in grids.iter().enumerate() {
        if !names.contains(&grid.name.as_str()) {
            return Err(RankTunerError::InvalidConfig(format!(
                "ranker family '{}' has no parameter '{}'",
                family, grid.name
            )));
        }
        if grids[..i].iter().any(|g| g.name == grid.name) {
            return Err(RankTunerError::InvalidConfig(format!(
                "parameter '{}' has more than one grid",
                grid.name
            )));
        }
        if let Some(bad) = grid.candidates.iter().find(|c| !c.is_finite()) {
            return Err(RankTunerError::InvalidConfig(format!(
                "parameter '{}' has non-finite candidate {}",
                grid.name, bad
            )));
        }
    }

    let mut ordered = grids.to_vec();
    ordered.sort_by_key(|g| names.iter().position(|n| *n == g.name));
    Ok(ordered)
}
