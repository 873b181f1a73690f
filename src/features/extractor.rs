use crate::features::color::{ColorHistogram, COLOR_FEATURE_LEN};
use crate::features::texture::{LocalBinaryPattern, TextureHistogram, TEXTURE_FEATURE_LEN};
use crate::image::ImageTransforms;
use crate::utils::error::ClassifyError;
use crate::Result;
use image::RgbImage;
use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::Serialize;

/// 归一化尺寸
pub const CANONICAL_SIZE: usize = 128;

/// 特征向量总长度（颜色在前，纹理在后）
pub const FEATURE_LEN: usize = COLOR_FEATURE_LEN + TEXTURE_FEATURE_LEN;

/// 定长特征向量
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    /// 拼接颜色与纹理子向量，并校验长度
    pub fn from_parts(color: Vec<f32>, texture: Vec<f32>) -> Result<Self> {
        let mut values = color;
        values.extend(texture);
        Self::from_vec(values)
    }

    pub fn from_vec(values: Vec<f32>) -> Result<Self> {
        if values.len() != FEATURE_LEN {
            return Err(ClassifyError::FeatureShape {
                expected: FEATURE_LEN,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn color(&self) -> &[f32] {
        &self.values[..COLOR_FEATURE_LEN]
    }

    pub fn texture(&self) -> &[f32] {
        &self.values[COLOR_FEATURE_LEN..]
    }

    /// 单行批次视图 (1 x L)
    pub fn as_batch(&self) -> ArrayView2<'_, f32> {
        ArrayView1::from(self.values.as_slice()).insert_axis(Axis(0))
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }
}

/// 颜色 + 纹理特征提取器，无内部可变状态
pub struct FeatureExtractor {
    color: ColorHistogram,
    texture: LocalBinaryPattern,
    size: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            color: ColorHistogram::default(),
            texture: LocalBinaryPattern::default(),
            size: CANONICAL_SIZE,
        }
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feature_len(&self) -> usize {
        self.color.len() + TEXTURE_FEATURE_LEN
    }

    pub fn extract(&self, image: &RgbImage) -> Result<FeatureVector> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifyError::InvalidInput(format!(
                "Cannot extract features from a {}x{} image",
                width, height
            )));
        }

        let array = ImageTransforms::to_array3(image)?;
        let resized = ImageTransforms::resize_bilinear(&array, self.size, self.size)?;

        let hsv = ImageTransforms::to_hsv(&resized)?;
        let color = self.color.compute(&hsv);

        let gray = ImageTransforms::to_gray(&resized)?;
        let codes = self.texture.compute(&gray);
        let texture = TextureHistogram::compute(&codes);

        tracing::debug!(
            "Extracted features from {}x{} image: color={}, texture={}",
            width,
            height,
            color.len(),
            texture.len()
        );

        FeatureVector::from_parts(color, texture)
    }
}
