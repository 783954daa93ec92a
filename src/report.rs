use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Offline evaluation metrics for one supervised model. The confusion
/// matrix follows the [[tn, fp], [fn, tp]] convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: [[u64; 2]; 2],
}

impl ModelMetrics {
    /// Compute metrics from parallel truth/prediction label slices
    /// (labels in {0, 1}, 1 = phishing).
    pub fn from_labels(model: &str, truth: &[u8], predicted: &[u8]) -> Self {
        let mut confusion = [[0u64; 2]; 2];
        for (&actual, &guess) in truth.iter().zip(predicted) {
            confusion[(actual == 1) as usize][(guess == 1) as usize] += 1;
        }
        let [[tn, fp], [fn_, tp]] = confusion;
        let total = tn + fp + fn_ + tp;

        let accuracy = ratio(tn + tp, total);
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        ModelMetrics {
            model: model.to_string(),
            accuracy,
            precision,
            recall,
            f1,
            confusion,
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

const CSV_HEADER: &str = "Model,Accuracy,Precision,Recall,F1 Score,Confusion Matrix";

/// Write the metrics report as CSV. The confusion-matrix column is a quoted
/// JSON array so the file stays one row per model.
pub fn write_csv(path: &Path, metrics: &[ModelMetrics]) -> Result<()> {
    let mut csv = String::new();
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for entry in metrics {
        let confusion = serde_json::to_string(&entry.confusion)?;
        csv.push_str(&format!(
            "{},{},{},{},{},\"{}\"\n",
            entry.model, entry.accuracy, entry.precision, entry.recall, entry.f1, confusion
        ));
    }
    std::fs::write(path, csv)
        .with_context(|| format!("failed to write metrics report {}", path.display()))
}

/// Read a metrics report previously written by [`write_csv`].
pub fn read_csv(path: &Path) -> Result<Vec<ModelMetrics>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read metrics report {}", path.display()))?;

    let mut lines = content.lines();
    match lines.next() {
        Some(header) if header == CSV_HEADER => {}
        other => bail!("unexpected metrics header: {:?}", other),
    }

    let mut metrics = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        // Only the last column may contain commas, so five splits are safe.
        let mut fields = line.splitn(6, ',');
        let mut next = || fields.next().context("truncated metrics row");
        let model = next()?.to_string();
        let accuracy: f64 = next()?.parse()?;
        let precision: f64 = next()?.parse()?;
        let recall: f64 = next()?.parse()?;
        let f1: f64 = next()?.parse()?;
        let confusion_cell = next()?.trim().trim_matches('"');
        let confusion: [[u64; 2]; 2] = serde_json::from_str(confusion_cell)
            .with_context(|| format!("bad confusion matrix for model {model}"))?;

        metrics.push(ModelMetrics {
            model,
            accuracy,
            precision,
            recall,
            f1,
            confusion,
        });
    }
    Ok(metrics)
}

/// Render the report as an aligned table for terminal display.
pub fn render_table(metrics: &[ModelMetrics]) -> String {
    let mut table = String::new();
    table.push_str(&format!(
        "{:<20} {:>9} {:>10} {:>8} {:>8}  {}\n",
        "Model", "Accuracy", "Precision", "Recall", "F1", "Confusion [tn fp / fn tp]"
    ));
    for entry in metrics {
        let [[tn, fp], [fn_, tp]] = entry.confusion;
        table.push_str(&format!(
            "{:<20} {:>9.4} {:>10.4} {:>8.4} {:>8.4}  [{} {} / {} {}]\n",
            entry.model, entry.accuracy, entry.precision, entry.recall, entry.f1, tn, fp, fn_, tp
        ));
    }
    table
}
