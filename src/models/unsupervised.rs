use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{load_artifact, FeatureSchema, Verdict};
use crate::features::consistency::ConsistencyFeatures;

/// Artifact names for the unsupervised pipeline. All three must load before
/// the pipeline offers inference. Each detector stands alone; there is no
/// voting across them.
pub const ANOMALY_MODELS: [&str; 3] = ["ocsvm", "lof", "isolation_forest"];

/// Guard against division by zero for densities of duplicated points.
const MIN_DENSITY_DISTANCE: f64 = 1e-10;

/// One node of a fitted isolation tree. `feature < 0` marks a leaf holding
/// the number of training samples that reached it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationNode {
    pub feature: i32,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub n_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<IsolationNode>,
}

impl IsolationTree {
    /// Path length from the root to the leaf `x` lands in, extended by the
    /// expected depth of an unbuilt subtree over the leaf's samples.
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            let node = &self.nodes[index];
            if node.feature < 0 {
                return depth + average_path_length(node.n_samples);
            }
            depth += 1.0;
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

/// Average path length of an unsuccessful search in a binary search tree
/// over `n` points; the isolation-score normalizer c(n).
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    let euler = 0.577_215_664_901_532_9;
    2.0 * ((n - 1.0).ln() + euler) - 2.0 * (n - 1.0) / n
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
}

/// The three fitted anomaly detector kinds. All emit the native
/// {+1 inlier, -1 outlier} label; translation to a verdict happens at the
/// [`Verdict::from_anomaly_label`] boundary only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyDetector {
    /// Kernel one-class boundary: RBF kernel over the fitted support
    /// vectors, decision = sum(alpha_i * K(sv_i, x)) - rho.
    OneClassSvm {
        gamma: f64,
        support_vectors: Vec<Vec<f64>>,
        dual_coef: Vec<f64>,
        rho: f64,
    },
    /// Local density outlier factor in novelty mode: the fitted training
    /// matrix with per-point k-distance and local reachability density.
    LocalOutlierFactor {
        n_neighbors: usize,
        training: Vec<Vec<f64>>,
        k_distances: Vec<f64>,
        lrd: Vec<f64>,
        offset: f64,
    },
    /// Tree-ensemble isolation score with the fitted decision offset.
    IsolationForest {
        trees: Vec<IsolationTree>,
        n_samples: usize,
        offset: f64,
    },
}

impl AnomalyDetector {
    /// Native anomaly label for a dense feature vector.
    fn decision_label(&self, x: &[f64]) -> i8 {
        match self {
            AnomalyDetector::OneClassSvm {
                gamma,
                support_vectors,
                dual_coef,
                rho,
            } => {
                let decision: f64 = support_vectors
                    .iter()
                    .zip(dual_coef)
                    .map(|(sv, alpha)| alpha * (-gamma * squared_distance(sv, x)).exp())
                    .sum::<f64>()
                    - rho;
                if decision > 0.0 {
                    1
                } else {
                    -1
                }
            }
            AnomalyDetector::LocalOutlierFactor {
                n_neighbors,
                training,
                k_distances,
                lrd,
                offset,
            } => {
                let mut neighbors: Vec<(f64, usize)> = training
                    .iter()
                    .enumerate()
                    .map(|(index, point)| (squared_distance(point, x).sqrt(), index))
                    .collect();
                neighbors.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                neighbors.truncate(*n_neighbors);

                let mean_reach = neighbors
                    .iter()
                    .map(|(distance, index)| distance.max(k_distances[*index]))
                    .sum::<f64>()
                    / neighbors.len() as f64;
                let query_lrd = 1.0 / mean_reach.max(MIN_DENSITY_DISTANCE);

                let neighbor_lrd = neighbors
                    .iter()
                    .map(|(_, index)| lrd[*index])
                    .sum::<f64>()
                    / neighbors.len() as f64;

                let lof = neighbor_lrd / query_lrd;
                // score_samples = -lof; below the fitted offset is an outlier.
                if -lof - offset < 0.0 {
                    -1
                } else {
                    1
                }
            }
            AnomalyDetector::IsolationForest {
                trees,
                n_samples,
                offset,
            } => {
                let mean_path = trees
                    .iter()
                    .map(|tree| tree.path_length(x))
                    .sum::<f64>()
                    / trees.len() as f64;
                let normalizer = average_path_length(*n_samples).max(MIN_DENSITY_DISTANCE);
                let anomaly_score = 2f64.powf(-mean_path / normalizer);
                // score_samples = -anomaly_score; below the offset is an outlier.
                if -anomaly_score - offset < 0.0 {
                    -1
                } else {
                    1
                }
            }
        }
    }

    fn dims_ok(&self, dims: usize) -> bool {
        match self {
            AnomalyDetector::OneClassSvm {
                support_vectors, ..
            } => support_vectors.iter().all(|sv| sv.len() == dims),
            AnomalyDetector::LocalOutlierFactor { training, .. } => {
                training.iter().all(|point| point.len() == dims)
            }
            AnomalyDetector::IsolationForest { trees, .. } => trees
                .iter()
                .all(|tree| tree.max_feature_index().map_or(true, |index| index < dims)),
        }
    }
}

/// A loaded anomaly model: schema contract plus the fitted detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyModel {
    pub name: String,
    pub schema: FeatureSchema,
    pub detector: AnomalyDetector,
}

impl AnomalyModel {
    pub fn load(model_dir: &Path, name: &str) -> Result<Self> {
        let model: AnomalyModel = load_artifact(model_dir, name)?;
        model.validate()?;
        log::info!("loaded anomaly model {}", model.name);
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        self.schema
            .validate(&ConsistencyFeatures::schema_fields(), &self.name)?;

        let dims = ConsistencyFeatures::FIELD_NAMES.len();
        if !self.detector.dims_ok(dims) {
            bail!(
                "model {}: fitted parameters do not cover {} feature dimensions",
                self.name,
                dims
            );
        }

        match &self.detector {
            AnomalyDetector::OneClassSvm {
                support_vectors,
                dual_coef,
                ..
            } => {
                if support_vectors.is_empty() || support_vectors.len() != dual_coef.len() {
                    bail!(
                        "model {}: {} support vectors with {} dual coefficients",
                        self.name,
                        support_vectors.len(),
                        dual_coef.len()
                    );
                }
            }
            AnomalyDetector::LocalOutlierFactor {
                n_neighbors,
                training,
                k_distances,
                lrd,
                ..
            } => {
                if *n_neighbors == 0 || training.is_empty() {
                    bail!("model {}: empty neighborhood", self.name);
                }
                if training.len() != k_distances.len() || training.len() != lrd.len() {
                    bail!(
                        "model {}: {} training points, {} k-distances, {} densities",
                        self.name,
                        training.len(),
                        k_distances.len(),
                        lrd.len()
                    );
                }
            }
            AnomalyDetector::IsolationForest { trees, .. } => {
                if trees.is_empty() {
                    bail!("model {}: isolation forest has no trees", self.name);
                }
            }
        }

        Ok(())
    }

    /// Native anomaly label in {+1, -1} for the consistency features.
    pub fn decision_label(&self, features: &ConsistencyFeatures) -> i8 {
        self.detector.decision_label(&features.dense_vector())
    }

    pub fn predict(&self, features: &ConsistencyFeatures) -> Verdict {
        Verdict::from_anomaly_label(self.decision_label(features))
    }
}
