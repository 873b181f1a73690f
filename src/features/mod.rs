pub mod color;
pub mod extractor;
pub mod texture;

pub use color::{ColorHistogram, COLOR_FEATURE_LEN};
pub use extractor::{FeatureExtractor, FeatureVector, CANONICAL_SIZE, FEATURE_LEN};
pub use texture::{LocalBinaryPattern, TextureHistogram, TEXTURE_FEATURE_LEN};
