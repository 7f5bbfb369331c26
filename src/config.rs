//! Run parameters for the (k,P)-anonymity pipelines.

use serde::{Deserialize, Serialize};

use crate::errors::{KpError, Result};
use crate::sax::MAX_ALPHABET;

/// Parameters shared by the naive and KAPRA pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymityParams {
    /// Minimum k-group size (k-anonymity requirement).
    pub k: usize,
    /// Minimum pattern-subgroup size (P-anonymity requirement).
    pub p: usize,
    /// PAA word length of the symbolic pattern representation.
    pub paa: usize,
    /// l-diversity bound: no sensitive value may cover more than 1/l of a
    /// pattern envelope.
    pub l: usize,
    /// Initial perturbation range for l-diversity repair.
    pub epsilon: i64,
    /// Maximum SAX granularity (alphabet size) of the pattern tree.
    pub max_level: usize,
}

impl Default for AnonymityParams {
    fn default() -> Self {
        Self {
            k: 4,
            p: 2,
            paa: 4,
            l: 2,
            epsilon: 1,
            max_level: 5,
        }
    }
}

impl AnonymityParams {
    /// Fatal parameter checks, run before any clustering starts.
    pub fn validate(&self, record_count: usize) -> Result<()> {
        if self.k < self.p {
            return Err(KpError::Params(format!(
                "k ({}) must be greater or equal than P ({})",
                self.k, self.p
            )));
        }
        if self.k > record_count {
            return Err(KpError::Params(format!(
                "k ({}) exceeds the {} available records",
                self.k, record_count
            )));
        }
        if self.p == 0 {
            return Err(KpError::Params("P must be at least 1".into()));
        }
        if self.paa == 0 {
            return Err(KpError::Params("PAA word length must be at least 1".into()));
        }
        if self.l == 0 {
            return Err(KpError::Params("l must be at least 1".into()));
        }
        if self.max_level < 2 || self.max_level > MAX_ALPHABET {
            return Err(KpError::Params(format!(
                "max_level must lie in 2..={}, got {}",
                MAX_ALPHABET, self.max_level
            )));
        }
        Ok(())
    }
}
