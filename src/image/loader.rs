use crate::config::MAX_IMAGE_BYTES;
use crate::utils::error::ClassifyError;
use crate::Result;
use base64::Engine;
use image::{GenericImageView, ImageFormat, RgbImage};

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str) -> Result<RgbImage> {
        Self::from_bytes(&Self::decode_base64(base64_data)?)
    }

    /// 解码base64为原始字节（不解码图像）
    pub fn decode_base64(base64_data: &str) -> Result<Vec<u8>> {
        // 移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        Ok(base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?)
    }

    /// 从字节解码图像，使用默认大小限制
    pub fn from_bytes(bytes: &[u8]) -> Result<RgbImage> {
        Self::from_bytes_limited(bytes, MAX_IMAGE_BYTES)
    }

    /// 从字节解码图像，统一转换为3通道RGB（丢弃alpha，灰度扩展）
    pub fn from_bytes_limited(bytes: &[u8], max_bytes: usize) -> Result<RgbImage> {
        if bytes.is_empty() {
            return Err(ClassifyError::InvalidInput("Empty image data".to_string()));
        }

        if bytes.len() > max_bytes {
            return Err(ClassifyError::FileTooLarge(bytes.len(), max_bytes));
        }

        if let Some(format) = Self::detect_format(bytes) {
            if !Self::is_supported_format(format) {
                return Err(ClassifyError::InvalidInput(format!(
                    "Unsupported image format: {:?}",
                    format
                )));
            }
        }

        let image = image::load_from_memory(bytes)?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifyError::InvalidInput(format!(
                "Decoded image has zero size: {}x{}",
                width, height
            )));
        }

        tracing::debug!(
            "Decoded image: {}x{}, color type {:?}",
            width,
            height,
            image.color()
        );

        Ok(image.to_rgb8())
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
                | ImageFormat::Gif
        )
    }
}
