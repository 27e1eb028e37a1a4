use crate::{
    error::{MetricsError, MetricsResult},
    types::DEFAULT_CHUNK_SIZE,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub events_path:      String,
    pub attribution_path: String,
    pub output_path:      String,
    /// SQLite database for run history. None skips persistence.
    pub db_path:          Option<String>,
    /// Rows per chunk. The only memory/I-O knob.
    pub chunk_size:       usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            events_path:      "event-data.csv".into(),
            attribution_path: "attribution-partners.csv".into(),
            output_path:      "dashboard_data.csv".into(),
            db_path:          None,
            chunk_size:       DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MetricsResult<()> {
        if self.chunk_size == 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "chunk_size must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Config for tests: tiny chunks so every boundary gets exercised.
    pub fn default_test() -> Self {
        Self {
            chunk_size: 3,
            ..Self::default()
        }
    }
}
