pub mod supervised;
pub mod unsupervised;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Version of the feature schema contract baked into each artifact.
pub const SCHEMA_VERSION: u32 = 1;

/// Binary classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Legitimate,
    Phishing,
}

impl Verdict {
    /// Translate a supervised class label: 1 = phishing, 0 = legitimate.
    pub fn from_class_label(label: u8) -> Self {
        if label == 1 {
            Verdict::Phishing
        } else {
            Verdict::Legitimate
        }
    }

    /// Translate an anomaly detector's native label: -1 = outlier = phishing,
    /// +1 = inlier = legitimate. This is the only place the sign convention
    /// is interpreted.
    pub fn from_anomaly_label(label: i8) -> Self {
        if label == -1 {
            Verdict::Phishing
        } else {
            Verdict::Legitimate
        }
    }

    pub fn is_phishing(&self) -> bool {
        matches!(self, Verdict::Phishing)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Legitimate => write!(f, "legitimate"),
            Verdict::Phishing => write!(f, "phishing"),
        }
    }
}

/// Feature schema a model artifact was fitted against. Validated against the
/// schema the code produces before any inference; a mismatch means code/model
/// version skew and is a fatal integration error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fields: Vec<String>,
}

impl FeatureSchema {
    pub fn new(fields: Vec<String>) -> Self {
        FeatureSchema {
            version: SCHEMA_VERSION,
            fields,
        }
    }

    pub fn validate(&self, expected: &[String], artifact: &str) -> Result<()> {
        if self.version != SCHEMA_VERSION {
            bail!(
                "model artifact {} uses schema version {}, this build expects {}",
                artifact,
                self.version,
                SCHEMA_VERSION
            );
        }
        if self.fields != expected {
            bail!(
                "model artifact {} was fitted against fields {:?}, this build produces {:?}",
                artifact,
                self.fields,
                expected
            );
        }
        Ok(())
    }
}

/// Load a model artifact named `<name>.json` from the model directory.
/// Missing or undecodable artifacts are fatal: no inference is offered until
/// every configured model has loaded.
pub fn load_artifact<T: DeserializeOwned>(model_dir: &Path, name: &str) -> Result<T> {
    let path = model_dir.join(format!("{name}.json"));
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read model artifact {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to decode model artifact {}", path.display()))
}
