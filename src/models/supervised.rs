use anyhow::{bail, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{load_artifact, FeatureSchema, Verdict};
use crate::features::metadata::MetadataFeatures;

/// Artifact names for the supervised pipeline. All three must load before
/// the pipeline offers inference.
pub const SUPERVISED_MODELS: [&str; 3] =
    ["classifier_logistic", "classifier_rf", "classifier_ridge"];

lazy_static! {
    // Two-or-more word characters, the tokenization the encoder was fit with.
    static ref TOKEN_RE: Regex = Regex::new(r"\b\w\w+\b").unwrap();
}

/// Fitted term-frequency/inverse-document-frequency encoder. The vocabulary
/// and idf weights come from the training phase; transform never refits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfEncoder {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
}

impl TfidfEncoder {
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Encode one document: term counts over the fitted vocabulary, weighted
    /// by idf, L2-normalized. Out-of-vocabulary tokens are dropped.
    pub fn transform(&self, text: &str) -> Vec<f64> {
        let mut row = vec![0.0; self.idf.len()];
        let text_lower = text.to_lowercase();
        for token in TOKEN_RE.find_iter(&text_lower) {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                row[index] += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(&self.idf) {
            *value *= idf;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut row {
                *value /= norm;
            }
        }
        row
    }
}

/// Fitted standardization transform for the numeric feature block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect()
    }
}

/// One node of a fitted decision tree. `feature < 0` marks a leaf carrying
/// class probabilities; inner nodes route on `x[feature] <= threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature: i32,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub class_weights: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn predict_proba(&self, x: &[f64]) -> [f64; 2] {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            if node.feature < 0 {
                return node.class_weights;
            }
            index = if x[node.feature as usize] <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }

    fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|node| node.feature >= 0)
            .map(|node| node.feature as usize)
            .max()
    }
}

/// The three fitted classifier kinds behind one prediction contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Logistic { weights: Vec<f64>, intercept: f64 },
    Ridge { weights: Vec<f64>, intercept: f64 },
    RandomForest { trees: Vec<DecisionTree> },
}

impl Classifier {
    /// Class label in {0, 1}; 1 = phishing.
    fn predict(&self, x: &[f64]) -> u8 {
        match self {
            Classifier::Logistic { weights, intercept }
            | Classifier::Ridge { weights, intercept } => {
                let decision: f64 =
                    x.iter().zip(weights).map(|(a, b)| a * b).sum::<f64>() + intercept;
                (decision > 0.0) as u8
            }
            Classifier::RandomForest { trees } => {
                let mut mean = [0.0, 0.0];
                for tree in trees {
                    let proba = tree.predict_proba(x);
                    mean[0] += proba[0];
                    mean[1] += proba[1];
                }
                (mean[1] > mean[0]) as u8
            }
        }
    }
}

/// A loaded supervised model: schema contract, fitted preprocessing and the
/// classifier itself. Pure inference; no state across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedModel {
    pub name: String,
    pub schema: FeatureSchema,
    pub tfidf: TfidfEncoder,
    pub scaler: StandardScaler,
    pub classifier: Classifier,
}

impl SupervisedModel {
    pub fn load(model_dir: &Path, name: &str) -> Result<Self> {
        let model: SupervisedModel = load_artifact(model_dir, name)?;
        model.validate()?;
        log::info!(
            "loaded supervised model {} ({} text features)",
            model.name,
            model.tfidf.n_features()
        );
        Ok(model)
    }

    /// Schema and dimension checks. Any drift between the feature code and
    /// the fitted artifact must fail here, before inference is offered.
    pub fn validate(&self) -> Result<()> {
        self.schema
            .validate(&MetadataFeatures::schema_fields(), &self.name)?;

        let meta_len = MetadataFeatures::NUMERIC_FIELDS.len();
        if self.scaler.mean.len() != meta_len || self.scaler.scale.len() != meta_len {
            bail!(
                "model {}: scaler covers {} fields, schema has {}",
                self.name,
                self.scaler.mean.len(),
                meta_len
            );
        }

        let dims = self.tfidf.n_features() + meta_len;
        match &self.classifier {
            Classifier::Logistic { weights, .. } | Classifier::Ridge { weights, .. } => {
                if weights.len() != dims {
                    bail!(
                        "model {}: classifier expects {} features, preprocessing yields {}",
                        self.name,
                        weights.len(),
                        dims
                    );
                }
            }
            Classifier::RandomForest { trees } => {
                if trees.is_empty() {
                    bail!("model {}: random forest has no trees", self.name);
                }
                for tree in trees {
                    if let Some(max_index) = tree.max_feature_index() {
                        if max_index >= dims {
                            bail!(
                                "model {}: tree splits on feature {}, preprocessing yields {}",
                                self.name,
                                max_index,
                                dims
                            );
                        }
                    }
                }
            }
        }

        for (&index, token) in self
            .tfidf
            .vocabulary
            .iter()
            .map(|(token, index)| (index, token))
        {
            if index >= self.tfidf.n_features() {
                bail!(
                    "model {}: vocabulary entry {:?} points past the idf table",
                    self.name,
                    token
                );
            }
        }

        Ok(())
    }

    pub fn predict(&self, features: &MetadataFeatures) -> Verdict {
        let mut x = self.tfidf.transform(&features.combined_text);
        x.extend(self.scaler.transform(&features.numeric_vector()));
        Verdict::from_class_label(self.classifier.predict(&x))
    }
}
