use crate::config::OnnxConfig;
use crate::models::classifier::{check_batch, Classifier};
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::{Array2, ArrayView2, Ix2};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::Path;

/// ONNX模型的附带元数据 (`<model>.meta.json`)
///
/// `n_features` 必填，特征长度校验依赖它。
#[derive(Debug, Clone, Deserialize)]
pub struct ModelMetadata {
    pub classes: Vec<String>,
    pub n_features: usize,
}

impl ModelMetadata {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClassifyError::ArtifactLoad(format!(
                "Model metadata not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::ArtifactLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let metadata: Self = serde_json::from_str(&content).map_err(|e| {
            ClassifyError::ArtifactLoad(format!("Malformed metadata {}: {}", path.display(), e))
        })?;

        if metadata.classes.is_empty() {
            return Err(ClassifyError::ArtifactLoad(format!(
                "Model metadata {} lists no classes",
                path.display()
            )));
        }
        if metadata.n_features == 0 {
            return Err(ClassifyError::ArtifactLoad(format!(
                "Model metadata {} declares zero features",
                path.display()
            )));
        }

        Ok(metadata)
    }
}

/// 基于ONNX Runtime的分类器
///
/// 模型需导出稠密概率张量（skl2onnx 中 `zipmap=False`）。
pub struct OnnxClassifier {
    session: Mutex<Session>,
    name: String,
    input_name: String,
    proba_output: String, // 动态发现的概率输出名称
    metadata: ModelMetadata,
}

impl OnnxClassifier {
    pub fn new(model_path: &Path, metadata_path: &Path, config: &OnnxConfig) -> Result<Self> {
        if !model_path.exists() {
            return Err(ClassifyError::ArtifactLoad(format!(
                "Model not found: {}",
                model_path.display()
            )));
        }

        let metadata = ModelMetadata::from_path(metadata_path)?;

        tracing::info!("Loading ONNX model from: {}", model_path.display());

        let session = Session::builder()
            .map_err(load_error(model_path))?
            .with_optimization_level(optimization_level(config.optimization_level))
            .map_err(load_error(model_path))?
            .with_intra_threads(config.intra_threads)
            .map_err(load_error(model_path))?
            .commit_from_file(model_path)
            .map_err(load_error(model_path))?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(ClassifyError::ArtifactLoad(
                    "ONNX model has no inputs".to_string(),
                ))
            }
        };

        // 优先选择名称中带 "prob" 的输出，否则取最后一个
        let proba_output = session
            .outputs
            .iter()
            .find(|output| output.name.to_lowercase().contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|output| output.name.clone())
            .ok_or_else(|| ClassifyError::ArtifactLoad("ONNX model has no outputs".to_string()))?;

        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("ONNX output[{}]: '{}'", i, output.name);
        }
        tracing::info!(
            "ONNX model input: '{}', probability output: '{}', classes: {}",
            input_name,
            proba_output,
            metadata.classes.len()
        );

        let name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        Ok(Self {
            session: Mutex::new(session),
            name,
            input_name,
            proba_output,
            metadata,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classes(&self) -> &[String] {
        &self.metadata.classes
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.metadata.n_features)
    }

    fn predict_proba(&self, batch: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        check_batch(&batch, self.n_features())?;

        let input_tensor = Tensor::from_array(batch.to_owned())?;
        let predictions = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(self.proba_output.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    let available_outputs: Vec<String> =
                        outputs.keys().map(|s| s.to_string()).collect();
                    return Err(ClassifyError::Inference(format!(
                        "Probability output '{}' not found. Available outputs: {:?}",
                        self.proba_output, available_outputs
                    )));
                }
            }
        };

        let proba = predictions.into_dimensionality::<Ix2>().map_err(|e| {
            ClassifyError::Inference(format!("Expected 2D probability tensor: {}", e))
        })?;

        if proba.nrows() != batch.nrows() || proba.ncols() != self.metadata.classes.len() {
            return Err(ClassifyError::Inference(format!(
                "Probability tensor shape {:?} does not match batch {} x {} classes",
                proba.dim(),
                batch.nrows(),
                self.metadata.classes.len()
            )));
        }

        Ok(proba)
    }
}

/// 加载阶段的ORT错误统一归为模型加载错误
fn load_error<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> ClassifyError + '_ {
    move |e| ClassifyError::ArtifactLoad(format!("{}: {}", path.display(), e))
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_metadata_parse() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"classes": ["cat", "dog"], "n_features": 521}}"#).unwrap();

        let metadata = ModelMetadata::from_path(file.path()).unwrap();
        assert_eq!(metadata.classes, vec!["cat".to_string(), "dog".to_string()]);
        assert_eq!(metadata.n_features, 521);
    }

    #[test]
    fn test_metadata_requires_classes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"classes": [], "n_features": 521}}"#).unwrap();
        assert!(matches!(
            ModelMetadata::from_path(file.path()),
            Err(ClassifyError::ArtifactLoad(_))
        ));
    }

    #[test]
    fn test_metadata_requires_feature_count() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"classes": ["cat", "dog"]}}"#).unwrap();
        let err = ModelMetadata::from_path(file.path()).unwrap_err();
        assert!(err.is_startup_error());
        assert!(err.to_string().contains("n_features"), "{err}");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"classes": ["cat", "dog"], "n_features": 0}}"#).unwrap();
        assert!(matches!(
            ModelMetadata::from_path(file.path()),
            Err(ClassifyError::ArtifactLoad(_))
        ));
    }

    #[test]
    fn test_missing_sidecar_feature_count_fails_before_session() {
        // 模型文件本身有效与否无关：元数据先于会话加载
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("narrow.onnx");
        let meta = dir.path().join("narrow.meta.json");
        std::fs::write(&model, b"placeholder").unwrap();
        std::fs::write(&meta, br#"{"classes": ["a", "b"]}"#).unwrap();

        let result = OnnxClassifier::new(&model, &meta, &OnnxConfig::default());
        assert!(matches!(result, Err(ClassifyError::ArtifactLoad(ref msg)) if msg.contains("n_features")));
    }

    #[test]
    fn test_missing_model_is_artifact_error() {
        let result = OnnxClassifier::new(
            Path::new("/no/such/model.onnx"),
            Path::new("/no/such/model.meta.json"),
            &OnnxConfig::default(),
        );
        assert!(matches!(result, Err(ClassifyError::ArtifactLoad(_))));
    }

    #[test]
    fn test_corrupt_model_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("broken.onnx");
        let meta = dir.path().join("broken.meta.json");
        std::fs::write(&model, b"this is not a protobuf").unwrap();
        std::fs::write(&meta, br#"{"classes": ["a", "b"], "n_features": 521}"#).unwrap();

        let result = OnnxClassifier::new(&model, &meta, &OnnxConfig::default());
        assert!(matches!(result, Err(ClassifyError::ArtifactLoad(_))));
    }
}
