//! Outlier flagging over the stored `[current, power]` history.

mod forest;
mod report;

use serde::Serialize;
use std::fmt;

pub use forest::{average_path_length, IsolationForest, IsolationTree, SplitNode};
pub use report::{analyze, classify, AnalysisError, AnalyzedSample, AnomalyReport};

/// Verdict for one sample. Wire values follow the usual `1` / `-1` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Normal,
    Outlier,
}

impl Label {
    pub fn from_raw(value: i8) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            -1 => Some(Self::Outlier),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i8 {
        match self {
            Self::Normal => 1,
            Self::Outlier => -1,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
            Self::Outlier => f.write_str("Anomalía"),
        }
    }
}

/// A pre-trained binary classifier over `[current, power]` pairs.
pub trait AnomalyModel: Send + Sync {
    /// One label per input sample, in input order.
    fn predict(&self, samples: &[[f64; 2]]) -> Vec<Label>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_map_both_ways() {
        assert_eq!(Label::from_raw(1), Some(Label::Normal));
        assert_eq!(Label::from_raw(-1), Some(Label::Outlier));
        assert_eq!(Label::from_raw(0), None);
        assert_eq!(Label::Outlier.as_raw(), -1);
    }

    #[test]
    fn display_uses_report_wording() {
        assert_eq!(Label::Normal.to_string(), "Normal");
        assert_eq!(Label::Outlier.to_string(), "Anomalía");
    }
}
