//! Trained xG classifiers.
//!
//! Models are binary classifiers exported by the training pipeline. The
//! primary artifact is ONNX (`model.onnx`); a plain logistic model
//! (`model.json`) is also accepted.

use anyhow::{Context, Result};
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Binary classifier returning the goal probability per input row.
pub trait XgModel: Send + Sync {
    /// Positive-class probability for each row of `features`
    /// (shape `(n_rows, n_features)`).
    fn predict_proba(&self, features: Array2<f32>) -> Result<Vec<f64>>;

    /// Short label of the artifact type.
    fn kind(&self) -> &'static str;
}

/// ONNX model wrapper.
///
/// Expects the layout produced by skl2onnx with zipmap disabled: output 0 is
/// the predicted label, output 1 the `[n_rows, 2]` class probabilities.
pub struct OnnxModel {
    session: Mutex<Session>,
}

impl OnnxModel {
    /// Load ONNX model from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)?
            .with_intra_threads(1)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(path.as_ref())
            .with_context(|| format!("Failed to load ONNX model {}", path.as_ref().display()))?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl XgModel for OnnxModel {
    fn predict_proba(&self, features: Array2<f32>) -> Result<Vec<f64>> {
        let n_rows = features.nrows();
        let input_tensor = Tensor::from_array(features)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock session: {}", e))?;

        let outputs = session.run(ort::inputs![input_tensor])?;
        if outputs.len() < 2 {
            anyhow::bail!("Expected at least 2 outputs from model");
        }

        let (shape, probs_data) = outputs[1]
            .try_extract_tensor::<f32>()
            .context("Failed to extract probability tensor")?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        if shape_dims.len() != 2 || shape_dims[0] as usize != n_rows || shape_dims[1] < 2 {
            anyhow::bail!(
                "Unexpected output shape: {:?}, expected [{}, 2]",
                shape_dims,
                n_rows
            );
        }

        let n_cols = shape_dims[1] as usize;
        Ok((0..n_rows)
            .map(|i| probs_data[i * n_cols + 1] as f64)
            .collect())
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

/// Logistic regression stored as JSON.
///
/// ```json
/// {"type": "logistic", "intercept": -2.1, "coefficients": [...]}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LogisticModel {
    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }
}

impl XgModel for LogisticModel {
    fn predict_proba(&self, features: Array2<f32>) -> Result<Vec<f64>> {
        if features.ncols() != self.coefficients.len() {
            anyhow::bail!(
                "Expected {} features, got {}",
                self.coefficients.len(),
                features.ncols()
            );
        }

        Ok(features
            .rows()
            .into_iter()
            .map(|row| {
                let z = row
                    .iter()
                    .zip(&self.coefficients)
                    .fold(self.intercept, |acc, (x, w)| acc + *x as f64 * w);
                Self::sigmoid(z)
            })
            .collect())
    }

    fn kind(&self) -> &'static str {
        "logistic"
    }
}

/// JSON model artifact, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonModel {
    Logistic(LogisticModel),
}

impl JsonModel {
    /// Load a JSON model artifact from file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let model: JsonModel = serde_json::from_str(&content)
            .with_context(|| format!("Invalid model file {}", path.as_ref().display()))?;
        Ok(model)
    }

    pub fn into_model(self) -> Box<dyn XgModel> {
        match self {
            JsonModel::Logistic(m) => Box::new(m),
        }
    }
}
