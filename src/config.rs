use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::supervised::SUPERVISED_MODELS;
use crate::models::unsupervised::ANOMALY_MODELS;

/// Runtime configuration for a scoring session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directory holding the serialized model artifacts.
    pub model_dir: String,
    #[serde(default = "PipelineConfig::supervised_default")]
    pub supervised: PipelineConfig,
    #[serde(default = "PipelineConfig::anomaly_default")]
    pub anomaly: PipelineConfig,
    /// Where the offline evaluation report lives.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub enabled: bool,
    pub models: Vec<String>,
}

impl PipelineConfig {
    fn supervised_default() -> Self {
        PipelineConfig {
            enabled: true,
            models: SUPERVISED_MODELS.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn anomaly_default() -> Self {
        PipelineConfig {
            enabled: true,
            models: ANOMALY_MODELS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

fn default_metrics_path() -> String {
    "model_metrics.csv".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            model_dir: "models".to_string(),
            supervised: PipelineConfig::supervised_default(),
            anomaly: PipelineConfig::anomaly_default(),
            metrics_path: default_metrics_path(),
        }
    }
}

impl ScanConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let config: ScanConfig =
            serde_yaml::from_str(&content).with_context(|| format!("invalid config file {path}"))?;
        Ok(config)
    }

    pub fn model_dir(&self) -> &Path {
        Path::new(&self.model_dir)
    }
}

/// Commented default configuration document for --generate-config.
pub fn default_config_yaml() -> String {
    let defaults = ScanConfig::default();
    format!(
        r#"# phishscan configuration
#
# Directory holding the serialized model artifacts (<model>.json files).
model_dir: "{model_dir}"

# Supervised pipeline: discriminative classifiers over the metadata+text
# feature schema. All listed artifacts must load or startup fails.
supervised:
  enabled: true
  models:
    - classifier_logistic
    - classifier_rf
    - classifier_ridge

# Unsupervised pipeline: anomaly detectors over the header-consistency
# feature schema. Each detector is reported separately; there is no voting.
anomaly:
  enabled: true
  models:
    - ocsvm
    - lof
    - isolation_forest

# Offline evaluation report (written by the training tooling, rendered by
# --metrics).
metrics_path: "{metrics_path}"
"#,
        model_dir = defaults.model_dir,
        metrics_path = defaults.metrics_path,
    )
}
