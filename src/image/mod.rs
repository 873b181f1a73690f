pub mod fetcher;
pub mod loader;
pub mod transforms;

pub use fetcher::{ImageFetcher, ImageSource};
pub use loader::ImageLoader;
pub use transforms::ImageTransforms;
