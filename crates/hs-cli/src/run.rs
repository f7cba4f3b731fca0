//! `hetstat run`: config-driven analysis.

use anyhow::{Context, Result};
use hs_inference::generic_ml::GenericMlConfig;
use hs_inference::learners::LearnerKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Dataset JSON. Relative paths are resolved against the config file's directory.
    pub input: PathBuf,
    /// Output file for results (pretty JSON). Defaults to stdout.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Proxy learner, e.g. `{kind: knn, k: 20}`.
    #[serde(default)]
    pub learner: LearnerKind,

    /// Threads (0 = auto).
    #[serde(default)]
    pub threads: usize,

    /// Print the regression table of the first split to stderr.
    #[serde(default)]
    pub table: bool,

    /// second_stage, groups, main_fraction, covariance, seed, n_splits.
    #[serde(flatten)]
    pub analysis: GenericMlConfig,
}

pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let mut cfg: RunConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        // Default: YAML (serde_yaml_ng).
        serde_yaml_ng::from_slice(&bytes)?
    };

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    cfg.input = resolve(base, &cfg.input);
    cfg.output = cfg.output.map(|o| resolve(base, &o));
    Ok(cfg)
}

fn resolve(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() { p.to_path_buf() } else { base.join(p) }
}
