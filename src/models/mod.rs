pub mod classifier;
pub mod manager;
pub mod mlp;
pub mod onnx;

pub use classifier::Classifier;
pub use manager::{load_classifier, ArtifactKind, ClassifierHandle, ModelStats};
pub use mlp::MlpClassifier;
pub use onnx::{ModelMetadata, OnnxClassifier};
