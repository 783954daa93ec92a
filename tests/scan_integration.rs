use phishscan::config::ScanConfig;
use phishscan::engine::ScanEngine;
use phishscan::features::consistency::ConsistencyFeatures;
use phishscan::features::metadata::MetadataFeatures;
use phishscan::models::supervised::{
    Classifier, DecisionTree, StandardScaler, SupervisedModel, TfidfEncoder, TreeNode,
};
use phishscan::models::unsupervised::{
    AnomalyDetector, AnomalyModel, IsolationNode, IsolationTree,
};
use phishscan::models::{FeatureSchema, Verdict};
use std::collections::HashMap;
use std::path::Path;

const PHISHING_EML: &[u8] = b"From: PayPal Security <security@paypal-verify.net>\r\n\
To: user@example.com\r\n\
Date: Tue, 1 Jul 2025 03:00:00 +0000\r\n\
\r\n\
Your account was suspended. Reset it at http://login-secure.paypal-verify.net/reset\r\n";

const BENIGN_EML: &[u8] = b"Message-ID: <abc123@mail.example.com>\r\n\
From: alice@example.com\r\n\
To: bob@example.com\r\n\
Subject: Lunch plans\r\n\
Date: Tue, 1 Jul 2025 12:00:00 +0000\r\n\
\r\n\
See you at noon.\r\n";

fn write_artifact<T: serde::Serialize>(dir: &Path, name: &str, model: &T) {
    let path = dir.join(format!("{name}.json"));
    std::fs::write(path, serde_json::to_string_pretty(model).unwrap()).unwrap();
}

fn identity_scaler() -> StandardScaler {
    StandardScaler {
        mean: vec![0.0; 9],
        scale: vec![1.0; 9],
    }
}

fn empty_encoder() -> TfidfEncoder {
    TfidfEncoder {
        vocabulary: HashMap::new(),
        idf: Vec::new(),
    }
}

/// Linear weights keyed on url_suspicious_count, domain_mismatch,
/// display_name_mismatch and sent_at_odd_hour; fires when at least three
/// of the four indicators are present.
fn linear_weights() -> Vec<f64> {
    let mut weights = vec![0.0; 9];
    weights[0] = 1.0; // url_suspicious_count
    weights[1] = 1.0; // domain_mismatch
    weights[4] = 1.0; // display_name_mismatch
    weights[7] = 1.0; // sent_at_odd_hour
    weights
}

fn supervised_model(name: &str, classifier: Classifier) -> SupervisedModel {
    SupervisedModel {
        name: name.to_string(),
        schema: FeatureSchema::new(MetadataFeatures::schema_fields()),
        tfidf: empty_encoder(),
        scaler: identity_scaler(),
        classifier,
    }
}

fn anomaly_model(name: &str, detector: AnomalyDetector) -> AnomalyModel {
    AnomalyModel {
        name: name.to_string(),
        schema: FeatureSchema::new(ConsistencyFeatures::schema_fields()),
        detector,
    }
}

fn write_model_suite(dir: &Path) {
    write_artifact(
        dir,
        "classifier_logistic",
        &supervised_model(
            "classifier_logistic",
            Classifier::Logistic {
                weights: linear_weights(),
                intercept: -2.5,
            },
        ),
    );
    write_artifact(
        dir,
        "classifier_ridge",
        &supervised_model(
            "classifier_ridge",
            Classifier::Ridge {
                weights: linear_weights(),
                intercept: -2.5,
            },
        ),
    );

    // One stump splitting on url_suspicious_count.
    let tree = DecisionTree {
        nodes: vec![
            TreeNode {
                feature: 0,
                threshold: 0.5,
                left: 1,
                right: 2,
                class_weights: [0.0, 0.0],
            },
            TreeNode {
                feature: -1,
                threshold: 0.0,
                left: 0,
                right: 0,
                class_weights: [1.0, 0.0],
            },
            TreeNode {
                feature: -1,
                threshold: 0.0,
                left: 0,
                right: 0,
                class_weights: [0.0, 1.0],
            },
        ],
    };
    write_artifact(
        dir,
        "classifier_rf",
        &supervised_model(
            "classifier_rf",
            Classifier::RandomForest { trees: vec![tree] },
        ),
    );

    // Normal envelope: subject present, valid Message-ID, everything else 0.
    let normal = vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    write_artifact(
        dir,
        "ocsvm",
        &anomaly_model(
            "ocsvm",
            AnomalyDetector::OneClassSvm {
                gamma: 1.0,
                support_vectors: vec![normal.clone()],
                dual_coef: vec![1.0],
                rho: 0.5,
            },
        ),
    );

    write_artifact(
        dir,
        "lof",
        &anomaly_model(
            "lof",
            AnomalyDetector::LocalOutlierFactor {
                n_neighbors: 2,
                training: vec![
                    vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                    vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
                    vec![0.0, 1.0, 1.0, 0.0, 0.0, 0.0],
                ],
                k_distances: vec![1.0, 1.0, 1.0, 1.0],
                lrd: vec![1.0, 1.0, 1.0, 1.0],
                offset: -1.1,
            },
        ),
    );

    let iso_tree = IsolationTree {
        nodes: vec![
            IsolationNode {
                feature: 0, // subject_empty
                threshold: 0.5,
                left: 1,
                right: 2,
                n_samples: 0,
            },
            IsolationNode {
                feature: -1,
                threshold: 0.0,
                left: 0,
                right: 0,
                n_samples: 980,
            },
            IsolationNode {
                feature: -1,
                threshold: 0.0,
                left: 0,
                right: 0,
                n_samples: 2,
            },
        ],
    };
    write_artifact(
        dir,
        "isolation_forest",
        &anomaly_model(
            "isolation_forest",
            AnomalyDetector::IsolationForest {
                trees: vec![iso_tree],
                n_samples: 1000,
                offset: -0.55,
            },
        ),
    );
}

fn engine_for(dir: &Path) -> ScanEngine {
    let config = ScanConfig {
        model_dir: dir.to_string_lossy().to_string(),
        ..Default::default()
    };
    ScanEngine::new(&config).unwrap()
}

#[test]
fn phishing_email_flagged_by_every_model() {
    let dir = tempfile::tempdir().unwrap();
    write_model_suite(dir.path());
    let engine = engine_for(dir.path());

    let report = engine.scan(PHISHING_EML);

    assert_eq!(report.supervised.len(), 3);
    for entry in &report.supervised {
        assert_eq!(entry.verdict, Verdict::Phishing, "model {}", entry.model);
    }
    assert_eq!(report.anomaly.len(), 3);
    for entry in &report.anomaly {
        assert_eq!(entry.verdict, Verdict::Phishing, "model {}", entry.model);
    }

    assert_eq!(report.record.subject, "");
    assert!(report.record.body.contains("login-secure"));
}

#[test]
fn benign_email_passes_every_model() {
    let dir = tempfile::tempdir().unwrap();
    write_model_suite(dir.path());
    let engine = engine_for(dir.path());

    let report = engine.scan(BENIGN_EML);

    for entry in report.supervised.iter().chain(&report.anomaly) {
        assert_eq!(entry.verdict, Verdict::Legitimate, "model {}", entry.model);
    }
    assert_eq!(report.headers.message_id, "<abc123@mail.example.com>");
}

#[test]
fn missing_single_artifact_blocks_the_session() {
    let dir = tempfile::tempdir().unwrap();
    write_model_suite(dir.path());
    std::fs::remove_file(dir.path().join("lof.json")).unwrap();

    let config = ScanConfig {
        model_dir: dir.path().to_string_lossy().to_string(),
        ..Default::default()
    };
    assert!(ScanEngine::new(&config).is_err());
}

#[test]
fn schema_drift_blocks_the_session() {
    let dir = tempfile::tempdir().unwrap();
    write_model_suite(dir.path());

    // Re-fit the logistic artifact against a reordered field list.
    let mut model = supervised_model(
        "classifier_logistic",
        Classifier::Logistic {
            weights: linear_weights(),
            intercept: -2.5,
        },
    );
    let mut fields = MetadataFeatures::schema_fields();
    fields.swap(1, 2);
    model.schema = FeatureSchema::new(fields);
    write_artifact(dir.path(), "classifier_logistic", &model);

    let config = ScanConfig {
        model_dir: dir.path().to_string_lossy().to_string(),
        ..Default::default()
    };
    assert!(ScanEngine::new(&config).is_err());
}
