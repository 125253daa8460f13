use serde::Serialize;
use thiserror::Error;

use crate::db::Database;

use super::{AnomalyModel, Label};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no historical readings available")]
    NoData,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalyzedSample {
    pub current: f64,
    pub power: f64,
    pub label: Label,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnomalyReport {
    pub rows: Vec<AnalyzedSample>,
}

impl AnomalyReport {
    fn partition(&self, label: Label) -> Vec<[f64; 2]> {
        self.rows
            .iter()
            .filter(|row| row.label == label)
            .map(|row| [row.current, row.power])
            .collect()
    }

    /// Points for the green half of a current/power scatter.
    pub fn normal(&self) -> Vec<[f64; 2]> {
        self.partition(Label::Normal)
    }

    pub fn outliers(&self) -> Vec<[f64; 2]> {
        self.partition(Label::Outlier)
    }

    pub fn outlier_count(&self) -> usize {
        self.rows.iter().filter(|row| row.label == Label::Outlier).count()
    }
}

/// Labels `samples` with `model`. Empty input is `NoData`.
pub fn classify(
    samples: &[[f64; 2]],
    model: &dyn AnomalyModel,
) -> Result<AnomalyReport, AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::NoData);
    }

    let labels = model.predict(samples);
    let rows = samples
        .iter()
        .zip(labels)
        .map(|(&[current, power], label)| AnalyzedSample {
            current,
            power,
            label,
        })
        .collect();

    Ok(AnomalyReport { rows })
}

/// Runs `model` over every stored reading that belongs to a device.
pub async fn analyze(
    db: &Database,
    model: &dyn AnomalyModel,
) -> Result<AnomalyReport, AnalysisError> {
    let samples = db.attributed_samples().await?;
    classify(&samples, model)
}
