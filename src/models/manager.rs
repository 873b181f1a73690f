use crate::models::{Classifier, MlpClassifier, OnnxClassifier};
use crate::utils::error::ClassifyError;
use crate::{Config, Result};
use std::sync::Arc;

/// 共享的只读分类器句柄
pub type ClassifierHandle = Arc<dyn Classifier>;

/// 模型制品格式（按扩展名区分）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Onnx,
    MlpJson,
}

impl ArtifactKind {
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("onnx") => Ok(Self::Onnx),
            Some("json") => Ok(Self::MlpJson),
            _ => Err(ClassifyError::ArtifactLoad(format!(
                "Unsupported model format: {} (expected .onnx or .json)",
                path.display()
            ))),
        }
    }
}

/// 加载分类器；在处理任何请求之前调用一次
pub fn load_classifier(config: &Config) -> Result<ClassifierHandle> {
    let model_path = &config.model_path;
    tracing::info!("Initializing classifier from {}", model_path.display());

    if !model_path.exists() {
        return Err(ClassifyError::ArtifactLoad(format!(
            "Model not found: {}",
            model_path.display()
        )));
    }

    let classifier: ClassifierHandle = match ArtifactKind::from_path(model_path)? {
        ArtifactKind::Onnx => Arc::new(OnnxClassifier::new(
            model_path,
            &config.metadata_path(),
            &config.onnx_config,
        )?),
        ArtifactKind::MlpJson => Arc::new(MlpClassifier::from_path(model_path)?),
    };

    tracing::info!(
        "Classifier '{}' loaded: {} classes, n_features={:?}",
        classifier.name(),
        classifier.classes().len(),
        classifier.n_features()
    );

    Ok(classifier)
}

/// 模型统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub name: String,
    pub classes: Vec<String>,
    pub n_features: Option<usize>,
}

impl ModelStats {
    pub fn of(classifier: &dyn Classifier) -> Self {
        Self {
            name: classifier.name().to_string(),
            classes: classifier.classes().to_vec(),
            n_features: classifier.n_features(),
        }
    }
}
