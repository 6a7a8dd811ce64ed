//! Pipeline parameters and their validation.
//!
//! Values come from the `[pipeline]` section; missing keys fall back to the
//! defaults below, while a value that is present but malformed is rejected.

use crate::domain::error::CorrnetError;
use crate::domain::network::NodeUniverse;
use crate::ports::config_port::ConfigPort;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MIN_DAYS_PER_ASSET: usize = 10;
pub const DEFAULT_CORR_THRESHOLD: f64 = 0.5;

const SECTION: &str = "pipeline";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub min_days_per_asset: usize,
    pub corr_threshold: f64,
    pub node_universe: NodeUniverse,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_days_per_asset: DEFAULT_MIN_DAYS_PER_ASSET,
            corr_threshold: DEFAULT_CORR_THRESHOLD,
            node_universe: NodeUniverse::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_min_days(mut self, min_days_per_asset: usize) -> Self {
        self.min_days_per_asset = min_days_per_asset;
        self
    }

    pub fn with_threshold(mut self, corr_threshold: f64) -> Self {
        self.corr_threshold = corr_threshold;
        self
    }

    pub fn validate(&self) -> Result<(), CorrnetError> {
        if self.min_days_per_asset < 1 {
            return Err(invalid(
                "min_days_per_asset",
                "min_days_per_asset must be at least 1",
            ));
        }
        if !self.corr_threshold.is_finite() || self.corr_threshold < 0.0 {
            return Err(invalid(
                "corr_threshold",
                "corr_threshold must be a non-negative number",
            ));
        }
        Ok(())
    }
}

pub fn build_pipeline_config(config: &dyn ConfigPort) -> Result<PipelineConfig, CorrnetError> {
    let min_days: i64 = parse_key(config, "min_days_per_asset")?
        .unwrap_or(DEFAULT_MIN_DAYS_PER_ASSET as i64);
    if min_days < 1 {
        return Err(invalid(
            "min_days_per_asset",
            "min_days_per_asset must be at least 1",
        ));
    }

    let node_universe = parse_key::<NodeUniverse>(config, "node_universe")?.unwrap_or_default();

    let pipeline = PipelineConfig {
        min_days_per_asset: min_days as usize,
        corr_threshold: parse_key(config, "corr_threshold")?.unwrap_or(DEFAULT_CORR_THRESHOLD),
        node_universe,
    };
    pipeline.validate()?;
    Ok(pipeline)
}

/// `None` when the key is missing or blank; a present value that does not
/// parse is an error rather than a silent default.
fn parse_key<T>(config: &dyn ConfigPort, key: &str) -> Result<Option<T>, CorrnetError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match config.get_string(SECTION, key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, &format!("'{}': {}", raw.trim(), e))),
        _ => Ok(None),
    }
}

fn invalid(key: &str, reason: &str) -> CorrnetError {
    CorrnetError::ConfigInvalid {
        section: SECTION.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
