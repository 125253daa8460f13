use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::{AnomalyModel, Label};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const FEATURES: usize = 2;

/// One node of an isolation tree. Nodes without children are leaves; their
/// `n_samples` is the training population that ended there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitNode {
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
    pub n_samples: usize,
}

/// Flat node list; index 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<SplitNode>,
}

/// Isolation forest exported from the training notebook as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    pub max_samples: usize,
    pub offset: f64,
    pub trees: Vec<IsolationTree>,
}

/// Expected path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl IsolationTree {
    fn path_length(&self, sample: &[f64; 2]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        // Bounded by node count so a malformed cycle cannot spin forever.
        for _ in 0..self.nodes.len() {
            let node = &self.nodes[index];
            match (node.feature, node.threshold, node.left, node.right) {
                (Some(feature), Some(threshold), Some(left), Some(right)) => {
                    index = if sample[feature] <= threshold { left } else { right };
                    depth += 1.0;
                }
                _ => return depth + average_path_length(node.n_samples),
            }
        }
        depth
    }

    fn validate(&self, position: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("tree {position} has no nodes");
        }
        for (index, node) in self.nodes.iter().enumerate() {
            let children = [node.left, node.right];
            if children.iter().any(|child| matches!(child, Some(c) if *c >= self.nodes.len())) {
                bail!("tree {position} node {index} points past the node list");
            }
            if node.left.is_some() != node.right.is_some() {
                bail!("tree {position} node {index} has a single child");
            }
            if node.left.is_some() {
                match node.feature {
                    Some(feature) if feature < FEATURES => {}
                    _ => bail!("tree {position} node {index} splits on an unknown feature"),
                }
                if node.threshold.is_none() {
                    bail!("tree {position} node {index} is missing its threshold");
                }
            }
        }
        Ok(())
    }
}

impl IsolationForest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid model {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let forest: Self = serde_json::from_str(raw).context("failed to parse model JSON")?;
        forest.validate()?;
        Ok(forest)
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            bail!("model has no trees");
        }
        if self.max_samples < 2 {
            bail!("max_samples must be at least 2, got {}", self.max_samples);
        }
        for (position, tree) in self.trees.iter().enumerate() {
            tree.validate(position)?;
        }
        Ok(())
    }

    /// Anomaly score in `[-1, 0)`; lower is more anomalous.
    pub fn score(&self, sample: &[f64; 2]) -> f64 {
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;
        -(2f64.powf(-mean_depth / average_path_length(self.max_samples)))
    }

    /// Negative values are outliers.
    pub fn decision(&self, sample: &[f64; 2]) -> f64 {
        self.score(sample) - self.offset
    }
}

impl AnomalyModel for IsolationForest {
    fn predict(&self, samples: &[[f64; 2]]) -> Vec<Label> {
        samples
            .iter()
            .map(|sample| {
                if self.decision(sample) < 0.0 {
                    Label::Outlier
                } else {
                    Label::Normal
                }
            })
            .collect()
    }
}
