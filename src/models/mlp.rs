use crate::models::classifier::{check_batch, Classifier};
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Logistic,
    Identity,
}

impl Activation {
    fn apply(self, values: &mut Array2<f32>) {
        match self {
            Activation::Relu => values.mapv_inplace(|v| v.max(0.0)),
            Activation::Tanh => values.mapv_inplace(f32::tanh),
            Activation::Logistic => values.mapv_inplace(logistic),
            Activation::Identity => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct LayerArtifact {
    weights: Vec<Vec<f32>>,
    biases: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct MlpArtifact {
    #[serde(default)]
    name: Option<String>,
    classes: Vec<String>,
    n_features: usize,
    #[serde(default)]
    activation: Activation,
    layers: Vec<LayerArtifact>,
}

struct DenseLayer {
    weights: Array2<f32>,
    biases: Array1<f32>,
}

/// 从JSON权重文件加载的多层感知机
///
/// 布局与 scikit-learn `MLPClassifier` 一致：`weights` 对应 `coefs_[i]`
/// (输入维 x 输出维)，`biases` 对应 `intercepts_[i]`。
/// 单个输出单元为二分类logistic输出，否则为softmax。
pub struct MlpClassifier {
    name: String,
    classes: Vec<String>,
    n_features: usize,
    activation: Activation,
    layers: Vec<DenseLayer>,
}

impl MlpClassifier {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClassifyError::ArtifactLoad(format!(
                "Model not found: {}",
                path.display()
            )));
        }

        tracing::info!("Loading MLP model from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::ArtifactLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let artifact: MlpArtifact = serde_json::from_str(content)
            .map_err(|e| ClassifyError::ArtifactLoad(format!("Malformed MLP artifact: {}", e)))?;

        Self::from_artifact(artifact)
    }

    fn from_artifact(artifact: MlpArtifact) -> Result<Self> {
        if artifact.classes.len() < 2 {
            return Err(ClassifyError::ArtifactLoad(format!(
                "MLP artifact needs at least 2 classes, got {}",
                artifact.classes.len()
            )));
        }
        if artifact.layers.is_empty() {
            return Err(ClassifyError::ArtifactLoad("MLP artifact has no layers".to_string()));
        }

        let mut layers = Vec::with_capacity(artifact.layers.len());
        let mut fan_in = artifact.n_features;

        for (i, layer) in artifact.layers.into_iter().enumerate() {
            if layer.weights.len() != fan_in {
                return Err(ClassifyError::ArtifactLoad(format!(
                    "Layer {} expects {} inputs, weights have {} rows",
                    i,
                    fan_in,
                    layer.weights.len()
                )));
            }

            let fan_out = layer.biases.len();
            if fan_out == 0 || layer.weights.iter().any(|row| row.len() != fan_out) {
                return Err(ClassifyError::ArtifactLoad(format!(
                    "Layer {} weight rows do not match {} biases",
                    i, fan_out
                )));
            }

            let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((fan_in, fan_out), flat)
                .map_err(|e| ClassifyError::ArtifactLoad(format!("Layer {} weights: {}", i, e)))?;

            layers.push(DenseLayer {
                weights,
                biases: Array1::from(layer.biases),
            });
            fan_in = fan_out;
        }

        let n_classes = artifact.classes.len();
        let valid_head = fan_in == n_classes || (fan_in == 1 && n_classes == 2);
        if !valid_head {
            return Err(ClassifyError::ArtifactLoad(format!(
                "Output layer has {} units for {} classes",
                fan_in, n_classes
            )));
        }

        let name = artifact.name.unwrap_or_else(|| "mlp".to_string());
        tracing::info!(
            "MLP model '{}' ready: {} layers, {} features, {} classes",
            name,
            layers.len(),
            artifact.n_features,
            n_classes
        );

        Ok(Self {
            name,
            classes: artifact.classes,
            n_features: artifact.n_features,
            activation: artifact.activation,
            layers,
        })
    }

    fn forward(&self, batch: ArrayView2<'_, f32>) -> Array2<f32> {
        let mut hidden = batch.to_owned();
        let last = self.layers.len() - 1;

        for (i, layer) in self.layers.iter().enumerate() {
            hidden = hidden.dot(&layer.weights) + &layer.biases;
            if i != last {
                self.activation.apply(&mut hidden);
            }
        }

        hidden
    }
}

impl Classifier for MlpClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict_proba(&self, batch: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        check_batch(&batch, Some(self.n_features))?;

        let mut logits = self.forward(batch);

        if logits.ncols() == 1 {
            let positive = logits.column(0).mapv(logistic);
            let mut proba = Array2::<f32>::zeros((logits.nrows(), 2));
            proba.column_mut(0).assign(&positive.mapv(|p| 1.0 - p));
            proba.column_mut(1).assign(&positive);
            return Ok(proba);
        }

        for mut row in logits.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }

        Ok(logits)
    }
}

fn logistic(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}
