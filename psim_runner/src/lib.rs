use std::{fs, path::Path};

use anyhow::Context;
use psim_core::{EventModel, SimOptions, SweepOptions};
use psim_schema::PlayChart;
use serde::Deserialize;

/// Simulator and sweep settings read from a JSON config file.
/// Missing sections fall back to their defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub sim: SimOptions,
    pub sweep: SweepOptions,
}

pub fn load_chart_json_from_path(path: impl AsRef<Path>) -> anyhow::Result<PlayChart> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("failed to read chart: {}", path.display()))?;
    let chart: PlayChart = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse chart json: {}", path.display()))?;
    Ok(chart)
}

pub fn load_chart_json_from_str(json: &str) -> anyhow::Result<PlayChart> {
    let chart: PlayChart = serde_json::from_str(json).context("failed to parse chart json")?;
    Ok(chart)
}

/// Reads and validates a chart, then builds its event model.
pub fn load_model_from_path(path: impl AsRef<Path>) -> anyhow::Result<(PlayChart, EventModel)> {
    let path = path.as_ref();
    let chart = load_chart_json_from_path(path)?;
    let model = EventModel::from_chart(&chart)
        .with_context(|| format!("invalid chart: {}", path.display()))?;
    Ok((chart, model))
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> anyhow::Result<RunConfig> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: RunConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse config json: {}", path.display()))?;
    config
        .sim
        .validate()
        .and_then(|_| config.sweep.validate())
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(config)
}
