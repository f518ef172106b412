use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};

/// Tunables for block evaluation shared by the filters of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Above this many distinct token sets an `in(...)` filter skips the bloom
    /// pre-check, since scanning every row is cheaper.
    pub max_token_sets: usize,
    /// The bloom pre-check is also skipped when the token sets outnumber
    /// `token_sets_per_row * rows_count` for the block.
    pub token_sets_per_row: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_token_sets: 1000,
            token_sets_per_row: 10,
        }
    }
}

impl SearchConfig {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: SearchConfig =
            serde_json::from_str(s).map_err(|e| FilterError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_token_sets == 0 {
            return Err(FilterError::InvalidConfig("max_token_sets must be positive".into()));
        }
        if self.token_sets_per_row == 0 {
            return Err(FilterError::InvalidConfig("token_sets_per_row must be positive".into()));
        }
        Ok(())
    }
}
