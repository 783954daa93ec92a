use anyhow::Result;
use serde::Serialize;

use crate::config::ScanConfig;
use crate::extractor::{extract_message, scan_headers, EmailRecord, HeaderBag};
use crate::features::consistency::ConsistencyFeatures;
use crate::features::metadata::MetadataFeatures;
use crate::models::supervised::SupervisedModel;
use crate::models::unsupervised::AnomalyModel;
use crate::models::Verdict;

/// One model's verdict on one email.
#[derive(Debug, Clone, Serialize)]
pub struct ModelVerdict {
    pub model: String,
    pub verdict: Verdict,
}

/// Everything a scan produces: the extracted records for display plus the
/// per-model verdicts of whichever pipelines ran.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub record: EmailRecord,
    pub headers: HeaderBag,
    pub supervised: Vec<ModelVerdict>,
    pub anomaly: Vec<ModelVerdict>,
}

/// Session-scoped scan engine. All configured model artifacts load at
/// construction; a missing artifact or schema mismatch fails the whole
/// session rather than degrading to partial functionality. After
/// construction the engine is read-only and each scan is independent.
pub struct ScanEngine {
    supervised: Vec<SupervisedModel>,
    anomaly: Vec<AnomalyModel>,
}

impl ScanEngine {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let model_dir = config.model_dir();

        let mut supervised = Vec::new();
        if config.supervised.enabled {
            for name in &config.supervised.models {
                supervised.push(SupervisedModel::load(model_dir, name)?);
            }
        }

        let mut anomaly = Vec::new();
        if config.anomaly.enabled {
            for name in &config.anomaly.models {
                anomaly.push(AnomalyModel::load(model_dir, name)?);
            }
        }

        log::info!(
            "scan engine ready: {} supervised, {} anomaly models",
            supervised.len(),
            anomaly.len()
        );
        Ok(ScanEngine {
            supervised,
            anomaly,
        })
    }

    /// Score one raw email with every loaded model. Extraction never fails;
    /// malformed input degrades to empty-string defaults upstream.
    pub fn scan(&self, raw: &[u8]) -> ScanReport {
        let record = extract_message(raw);
        let headers = scan_headers(&String::from_utf8_lossy(raw));

        let supervised = if self.supervised.is_empty() {
            Vec::new()
        } else {
            let features = MetadataFeatures::from_record(&record);
            log::debug!("metadata features: {:?}", features);
            self.supervised
                .iter()
                .map(|model| ModelVerdict {
                    model: model.name.clone(),
                    verdict: model.predict(&features),
                })
                .collect()
        };

        let anomaly = if self.anomaly.is_empty() {
            Vec::new()
        } else {
            let features = ConsistencyFeatures::from_headers(&headers);
            log::debug!("consistency features: {:?}", features);
            self.anomaly
                .iter()
                .map(|model| ModelVerdict {
                    model: model.name.clone(),
                    verdict: model.predict(&features),
                })
                .collect()
        };

        ScanReport {
            record,
            headers,
            supervised,
            anomaly,
        }
    }
}
