//! Choice of the ranking function used at query time.

use crate::error::Result;
use crate::ranker::{RankerConfig, RankerFamily};
use crate::training::TrainingStore;
use tracing::{debug, info};

/// Identifier that selects the best trained family.
pub const BEST: &str = "best";

/// Picks a ranker configuration from persisted training results.
#[derive(Debug, Clone)]
pub struct RankerSelector {
    store: TrainingStore,
}

impl RankerSelector {
    pub fn new(store: TrainingStore) -> Self {
        Self { store }
    }

    /// The trained configuration with the highest MAP.
    ///
    /// Families without a stored result count as MAP 0.0. The first family in
    /// declared order wins ties. With no stored results at all, the default
    /// BM25 configuration is returned.
    pub fn best_ranker(&self) -> Result<RankerConfig> {
        let mut best: Option<(f64, RankerConfig)> = None;
        let mut any_trained = false;

        for family in RankerFamily::ALL {
            let (map, ranker) = match self.store.load(family)? {
                Some(result) => {
                    any_trained = true;
                    (result.map, result.ranker)
                }
                None => (0.0, family.default_config()),
            };
            debug!(family = %family, map, "training result");

            let better = match &best {
                Some((best_map, _)) => map > *best_map,
                None => true,
            };
            if better {
                best = Some((map, ranker));
            }
        }

        match best {
            Some((map, ranker)) if any_trained => {
                info!(ranker = %ranker, map, "selected best ranker");
                Ok(ranker)
            }
            _ => {
                info!("no training results, using default ranker");
                Ok(RankerConfig::default())
            }
        }
    }

    /// Resolve a ranker identifier.
    ///
    /// `"best"` selects via [`best_ranker`](Self::best_ranker). A family name
    /// returns that family's trained configuration. Returns `None` for an
    /// unknown identifier or a family that has not been trained; the caller
    /// decides what to fall back to.
    pub fn load(&self, identifier: &str) -> Result<Option<RankerConfig>> {
        if identifier.trim().eq_ignore_ascii_case(BEST) {
            return self.best_ranker().map(Some);
        }
        match RankerFamily::parse(identifier) {
            Some(family) => Ok(self.store.load(family)?.map(|result| result.ranker)),
            None => {
                debug!(identifier, "unknown ranker identifier");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SaveFormat;
    use crate::training::TrainingResult;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> TrainingStore {
        TrainingStore::new(dir.path(), SaveFormat::Json)
    }

    fn save(store: &TrainingStore, map: f64, ranker: RankerConfig) {
        store.save(&TrainingResult { map, ranker }, 1).unwrap();
    }

    #[test]
    fn test_no_results_returns_default() {
        let dir = TempDir::new().unwrap();
        let selector = RankerSelector::new(store(&dir));
        assert_eq!(selector.best_ranker().unwrap(), RankerConfig::default());
    }

    #[test]
    fn test_higher_map_wins() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let bm25 = RankerConfig::OkapiBm25 {
            k1: 0.9,
            b: 0.4,
            k3: 300.0,
        };
        let jm = RankerConfig::JelinekMercer { lambda: 0.2 };

        save(&store, 0.58, bm25);
        save(&store, 0.62, jm);
        assert_eq!(RankerSelector::new(store.clone()).best_ranker().unwrap(), jm);

        save(&store, 0.62, bm25);
        save(&store, 0.58, jm);
        assert_eq!(RankerSelector::new(store).best_ranker().unwrap(), bm25);
    }

    #[test]
    fn test_first_family_wins_ties() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let bm25 = RankerConfig::OkapiBm25 {
            k1: 1.5,
            b: 0.3,
            k3: 0.0,
        };
        save(&store, 0.5, bm25);
        save(&store, 0.5, RankerConfig::JelinekMercer { lambda: 0.4 });

        assert_eq!(RankerSelector::new(store).best_ranker().unwrap(), bm25);
    }

    #[test]
    fn test_only_one_family_trained() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let jm = RankerConfig::JelinekMercer { lambda: 0.1 };
        save(&store, 0.3, jm);

        assert_eq!(RankerSelector::new(store).best_ranker().unwrap(), jm);
    }

    #[test]
    fn test_load_identifiers() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let selector = RankerSelector::new(store.clone());

        assert_eq!(selector.load("best").unwrap(), Some(RankerConfig::default()));
        assert_eq!(selector.load("bm25").unwrap(), None);
        assert_eq!(selector.load("dirichlet-prior").unwrap(), None);

        let jm = RankerConfig::JelinekMercer { lambda: 0.6 };
        save(&store, 0.4, jm);
        assert_eq!(selector.load("jelinek").unwrap(), Some(jm));
        assert_eq!(selector.load("BEST").unwrap(), Some(jm));
    }

    #[test]
    fn test_corrupt_result_propagates() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path_for(RankerFamily::OkapiBm25), "0.62\n").unwrap();
        assert!(RankerSelector::new(store).best_ranker().is_err());
    }
}
