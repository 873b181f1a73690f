use crate::{
    features::{FeatureExtractor, FeatureVector, FEATURE_LEN},
    image::{ImageFetcher, ImageLoader, ImageSource},
    inference::{InferenceStats, Prediction},
    models::ClassifierHandle,
    utils::error::ClassifyError,
    Result,
};
use image::RgbImage;
use std::time::Instant;

/// 分类流水线：抓取 -> 解码 -> 特征提取 -> 预测
///
/// 分类器句柄只读，可在多个请求间共享。
pub struct ClassificationPipeline {
    classifier: ClassifierHandle,
    fetcher: ImageFetcher,
    extractor: FeatureExtractor,
}

impl ClassificationPipeline {
    pub fn new(classifier: ClassifierHandle, fetcher: ImageFetcher) -> Result<Self> {
        if let Some(expected) = classifier.n_features() {
            if expected != FEATURE_LEN {
                return Err(ClassifyError::FeatureShape {
                    expected,
                    actual: FEATURE_LEN,
                });
            }
        }

        Ok(Self {
            classifier,
            fetcher,
            extractor: FeatureExtractor::new(),
        })
    }

    pub fn classifier(&self) -> &ClassifierHandle {
        &self.classifier
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// 处理URL或本地路径
    pub async fn classify_source(&self, source: &str) -> Result<Prediction> {
        let source = ImageSource::parse(source)?;
        self.classify(&source).await
    }

    /// 处理已解析的图像来源
    pub async fn classify(&self, source: &ImageSource) -> Result<Prediction> {
        let mut stats = InferenceStats::default();

        let fetch_start = Instant::now();
        let bytes = self.fetch(source).await?;
        stats.fetch_time_ms = fetch_start.elapsed().as_millis() as u64;

        let prediction = self.classify_bytes_with_stats(&bytes, &mut stats)?;

        tracing::info!(
            "Classified {}: {} (total_time={}ms)",
            source,
            prediction,
            stats.total().as_millis()
        );
        tracing::debug!("Stage timings: {:?}", stats);

        Ok(prediction)
    }

    /// 只抓取原始字节，解码与特征提取由调用方安排
    pub async fn fetch(&self, source: &ImageSource) -> Result<Vec<u8>> {
        self.fetcher.fetch(source).await
    }

    /// 处理已获取的图像字节
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        self.classify_bytes_with_stats(bytes, &mut InferenceStats::default())
    }

    fn classify_bytes_with_stats(&self, bytes: &[u8], stats: &mut InferenceStats) -> Result<Prediction> {
        let decode_start = Instant::now();
        let image = ImageLoader::from_bytes_limited(bytes, self.fetcher.max_bytes())?;
        stats.decode_time_ms = decode_start.elapsed().as_millis() as u64;

        self.classify_image_with_stats(&image, stats)
    }

    /// 处理已解码的图像
    pub fn classify_image(&self, image: &RgbImage) -> Result<Prediction> {
        self.classify_image_with_stats(image, &mut InferenceStats::default())
    }

    fn classify_image_with_stats(&self, image: &RgbImage, stats: &mut InferenceStats) -> Result<Prediction> {
        let extract_start = Instant::now();
        let features = self.extractor.extract(image)?;
        stats.extract_time_ms = extract_start.elapsed().as_millis() as u64;

        let predict_start = Instant::now();
        let prediction = self.predict_features(&features)?;
        stats.predict_time_ms = predict_start.elapsed().as_millis() as u64;

        Ok(prediction)
    }

    /// 对单个特征向量做预测（批次大小为1）
    pub fn predict_features(&self, features: &FeatureVector) -> Result<Prediction> {
        if features.len() != FEATURE_LEN {
            return Err(ClassifyError::FeatureShape {
                expected: FEATURE_LEN,
                actual: features.len(),
            });
        }

        let batch = features.as_batch();
        let labels = self.classifier.predict(batch)?;
        let proba = self.classifier.predict_proba(batch)?;

        let label = labels
            .into_iter()
            .next()
            .ok_or_else(|| ClassifyError::Inference("Classifier returned no label".to_string()))?;

        if proba.nrows() != 1 || proba.ncols() != self.classifier.classes().len() {
            return Err(ClassifyError::Inference(format!(
                "Probability shape {:?} does not match 1 x {} classes",
                proba.dim(),
                self.classifier.classes().len()
            )));
        }

        let confidence = proba
            .row(0)
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);

        if !confidence.is_finite() {
            return Err(ClassifyError::Inference(format!(
                "Classifier produced a non-finite confidence: {}",
                confidence
            )));
        }

        Ok(Prediction::new(label, confidence.clamp(0.0, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::models::Classifier;
    use image::Rgb;
    use ndarray::{Array2, ArrayView2};
    use std::sync::Arc;

    /// 按颜色子向量第63维（纯红箱）判断
    struct RedDetector {
        classes: Vec<String>,
        n_features: Option<usize>,
    }

    impl RedDetector {
        fn handle(n_features: Option<usize>) -> ClassifierHandle {
            Arc::new(Self {
                classes: vec!["other".to_string(), "red".to_string()],
                n_features,
            })
        }
    }

    impl Classifier for RedDetector {
        fn name(&self) -> &str {
            "red-detector"
        }

        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn n_features(&self) -> Option<usize> {
            self.n_features
        }

        fn predict_proba(&self, batch: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
            let mut proba = Array2::zeros((batch.nrows(), 2));
            for (i, row) in batch.rows().into_iter().enumerate() {
                let red = row[63].clamp(0.0, 1.0) * 0.8 + 0.1;
                proba[[i, 0]] = 1.0 - red;
                proba[[i, 1]] = red;
            }
            Ok(proba)
        }
    }

    fn pipeline() -> ClassificationPipeline {
        let fetcher = ImageFetcher::new(&FetchConfig::default()).unwrap();
        ClassificationPipeline::new(RedDetector::handle(Some(FEATURE_LEN)), fetcher).unwrap()
    }

    #[test]
    fn test_solid_red_image() {
        let red = RgbImage::from_pixel(128, 128, Rgb([255, 0, 0]));
        let prediction = pipeline().classify_image(&red).unwrap();
        assert_eq!(prediction.label, "red");
        assert!((prediction.confidence - 0.9).abs() < 1e-6);
        assert_eq!(prediction.to_string(), "red|0.90");
    }

    #[test]
    fn test_blue_image() {
        let blue = RgbImage::from_pixel(64, 32, Rgb([0, 0, 255]));
        let prediction = pipeline().classify_image(&blue).unwrap();
        assert_eq!(prediction.label, "other");
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }

    #[test]
    fn test_mismatched_classifier_rejected() {
        let fetcher = ImageFetcher::new(&FetchConfig::default()).unwrap();
        let result = ClassificationPipeline::new(RedDetector::handle(Some(100)), fetcher);
        assert!(matches!(
            result.err(),
            Some(ClassifyError::FeatureShape { expected: 100, actual: FEATURE_LEN })
        ));
    }

    #[test]
    fn test_decode_failure() {
        let result = pipeline().classify_bytes(b"GIF-ish garbage that is not an image");
        assert!(matches!(result, Err(ClassifyError::ImageDecode(_))));
    }

    #[tokio::test]
    async fn test_unreachable_source() {
        let result = pipeline().classify_source("http://127.0.0.1:1/cat.png").await;
        let err = result.unwrap_err();
        assert!(matches!(err, ClassifyError::Fetch { .. }));
        assert_eq!(err.exit_code(), 2);
    }
}
