use std::path::Path;

use anyhow::{Context, Result};
use formflow_engine::EngineConfig;

/// Engine settings from `--config`, with command line overrides applied last.
pub fn engine_config(path: Option<&Path>, max_passes: Option<usize>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(passes) = max_passes {
        config = config.with_max_passes(passes);
        config.validate().context("invalid --max-passes")?;
    }
    Ok(config)
}
