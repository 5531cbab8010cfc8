//! Ranking-function families and their parameterized configurations.
//!
//! The scoring formulas themselves live in the external index library; this
//! module only names the families, their tunable parameters and the defaults
//! the library uses when nothing has been tuned yet.

use crate::error::{RankTunerError, Result};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A family of ranking functions.
///
/// The declaration order is the comparison order used when selecting the best
/// trained ranker: earlier families win ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "kebab-case")]
pub enum RankerFamily {
    /// Okapi BM25 with `k1`, `b` and `k3`.
    OkapiBm25,
    /// Jelinek-Mercer smoothed language model with `lambda`.
    JelinekMercer,
}

impl RankerFamily {
    /// All families in declared comparison order.
    pub const ALL: [RankerFamily; 2] = [RankerFamily::OkapiBm25, RankerFamily::JelinekMercer];

    /// Stable identifier used in file names and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            RankerFamily::OkapiBm25 => "bm25",
            RankerFamily::JelinekMercer => "jelinek-mercer",
        }
    }

    /// Parse a family identifier (case-insensitive, a few common aliases).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bm25" | "okapi-bm25" | "okapi_bm25" | "okapibm25" => Some(RankerFamily::OkapiBm25),
            "jelinek-mercer" | "jelinek_mercer" | "jelinek" | "jelink" | "jm" => {
                Some(RankerFamily::JelinekMercer)
            }
            _ => None,
        }
    }

    /// Tunable parameter names, in the fixed order they are searched.
    pub fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            RankerFamily::OkapiBm25 => &["k1", "b", "k3"],
            RankerFamily::JelinekMercer => &["lambda"],
        }
    }

    /// The untuned configuration for this family.
    pub fn default_config(&self) -> RankerConfig {
        match self {
            RankerFamily::OkapiBm25 => RankerConfig::OkapiBm25 {
                k1: 1.2,
                b: 0.75,
                k3: 500.0,
            },
            RankerFamily::JelinekMercer => RankerConfig::JelinekMercer { lambda: 0.7 },
        }
    }
}

impl fmt::Display for RankerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A ranking-function family together with concrete parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "kebab-case")]
pub enum RankerConfig {
    OkapiBm25 { k1: f64, b: f64, k3: f64 },
    JelinekMercer { lambda: f64 },
}

impl Default for RankerConfig {
    /// BM25 with library defaults, used when no trained ranker exists.
    fn default() -> Self {
        RankerFamily::OkapiBm25.default_config()
    }
}

impl RankerConfig {
    /// The family this configuration belongs to.
    pub fn family(&self) -> RankerFamily {
        match self {
            RankerConfig::OkapiBm25 { .. } => RankerFamily::OkapiBm25,
            RankerConfig::JelinekMercer { .. } => RankerFamily::JelinekMercer,
        }
    }

    /// Named parameter values in the family's declared order.
    pub fn params(&self) -> Vec<(&'static str, f64)> {
        match *self {
            RankerConfig::OkapiBm25 { k1, b, k3 } => vec![("k1", k1), ("b", b), ("k3", k3)],
            RankerConfig::JelinekMercer { lambda } => vec![("lambda", lambda)],
        }
    }

    /// Look up a single parameter by name.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.params()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Return a copy with one parameter replaced.
    pub fn with_param(&self, name: &str, value: f64) -> Result<Self> {
        let mut next = *self;
        let slot = match (&mut next, name) {
            (RankerConfig::OkapiBm25 { k1, .. }, "k1") => k1,
            (RankerConfig::OkapiBm25 { b, .. }, "b") => b,
            (RankerConfig::OkapiBm25 { k3, .. }, "k3") => k3,
            (RankerConfig::JelinekMercer { lambda }, "lambda") => lambda,
            _ => {
                return Err(RankTunerError::InvalidConfig(format!(
                    "ranker family '{}' has no parameter '{}'",
                    self.family(),
                    name
                )));
            }
        };
        *slot = value;
        Ok(next)
    }

    /// Check that every parameter is a finite number.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in self.params() {
            if !value.is_finite() {
                return Err(format!("parameter '{}' is not finite: {}", name, value));
            }
        }
        Ok(())
    }

    /// Compact label such as `bm25(k1=1.2,b=0.75,k3=500)`.
    ///
    /// Replay run files key per-configuration rankings by this label.
    pub fn label(&self) -> String {
        let params = self
            .params()
            .into_iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({})", self.family().id(), params)
    }
}

impl fmt::Display for RankerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
