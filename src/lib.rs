pub mod config;
pub mod features;
pub mod image;
pub mod inference;
pub mod models;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use inference::{ClassificationPipeline, Prediction};
pub use utils::error::ClassifyError;

pub type Result<T> = std::result::Result<T, ClassifyError>;
