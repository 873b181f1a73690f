use crate::utils::error::ClassifyError;
use crate::Result;
use image::RgbImage;
use ndarray::{Array2, Array3};

/// 定点运算的移位位数（与OpenCV 8位颜色转换一致）
const HSV_SHIFT: u32 = 12;
const YUV_SHIFT: u32 = 14;

/// 灰度系数，按14位定点缩放
const R2Y: i32 = 4899;
const G2Y: i32 = 9617;
const B2Y: i32 = 1868;

/// 8位HSV中色相的取值上界
pub const HUE_RANGE: i32 = 180;

/// 图像变换工具集（HWC布局，RGB通道顺序）
pub struct ImageTransforms;

impl ImageTransforms {
    /// 转换RgbImage为ndarray::Array3<u8> (HWC格式)
    pub fn to_array3(image: &RgbImage) -> Result<Array3<u8>> {
        let (width, height) = image.dimensions();
        Array3::from_shape_vec(
            (height as usize, width as usize, 3),
            image.as_raw().clone(),
        )
        .map_err(|e| ClassifyError::Internal(format!("Invalid image buffer: {}", e)))
    }

    /// 双线性插值缩放到固定尺寸
    ///
    /// 坐标映射使用像素中心对齐 `src = (dst + 0.5) * scale - 0.5`，越界时钳位到边缘。
    /// 尺寸相同时直接复制。
    pub fn resize_bilinear(
        image: &Array3<u8>,
        target_width: usize,
        target_height: usize,
    ) -> Result<Array3<u8>> {
        let (orig_h, orig_w, channels) = image.dim();

        if orig_h == 0 || orig_w == 0 || target_width == 0 || target_height == 0 {
            return Err(ClassifyError::InvalidInput(format!(
                "Cannot resize {}x{} image to {}x{}",
                orig_w, orig_h, target_width, target_height
            )));
        }

        if orig_h == target_height && orig_w == target_width {
            return Ok(image.clone());
        }

        let x_taps = Self::linear_taps(orig_w, target_width);
        let y_taps = Self::linear_taps(orig_h, target_height);

        let mut resized = Array3::<u8>::zeros((target_height, target_width, channels));

        for (h, &(h1, h2, dh)) in y_taps.iter().enumerate() {
            for (w, &(w1, w2, dw)) in x_taps.iter().enumerate() {
                for c in 0..channels {
                    let v11 = image[[h1, w1, c]] as f32;
                    let v12 = image[[h1, w2, c]] as f32;
                    let v21 = image[[h2, w1, c]] as f32;
                    let v22 = image[[h2, w2, c]] as f32;

                    let interpolated = v11 * (1.0 - dh) * (1.0 - dw)
                        + v12 * (1.0 - dh) * dw
                        + v21 * dh * (1.0 - dw)
                        + v22 * dh * dw;

                    resized[[h, w, c]] = interpolated.round().clamp(0.0, 255.0) as u8;
                }
            }
        }

        Ok(resized)
    }

    /// 每个目标坐标对应的 (左/上索引, 右/下索引, 权重)
    fn linear_taps(src_len: usize, dst_len: usize) -> Vec<(usize, usize, f32)> {
        let scale = src_len as f32 / dst_len as f32;
        let last = src_len - 1;

        (0..dst_len)
            .map(|d| {
                let f = (d as f32 + 0.5) * scale - 0.5;
                let floor = f.floor();
                let (i, frac) = if floor < 0.0 {
                    (0, 0.0)
                } else if floor as usize >= last {
                    (last, 0.0)
                } else {
                    (floor as usize, f - floor)
                };
                (i, (i + 1).min(last), frac)
            })
            .collect()
    }

    /// RGB转HSV（8位：H∈[0,180)，S、V∈[0,255]）
    pub fn to_hsv(image: &Array3<u8>) -> Result<Array3<u8>> {
        let (height, width, channels) = image.dim();
        if channels != 3 {
            return Err(ClassifyError::InvalidInput(format!(
                "HSV conversion needs 3 channels, got {}",
                channels
            )));
        }

        let tables = HsvTables::new();
        let mut hsv = Array3::<u8>::zeros((height, width, 3));

        for h in 0..height {
            for w in 0..width {
                let r = image[[h, w, 0]];
                let g = image[[h, w, 1]];
                let b = image[[h, w, 2]];
                let (hue, sat, val) = tables.convert(r, g, b);
                hsv[[h, w, 0]] = hue;
                hsv[[h, w, 1]] = sat;
                hsv[[h, w, 2]] = val;
            }
        }

        Ok(hsv)
    }

    /// RGB转灰度
    pub fn to_gray(image: &Array3<u8>) -> Result<Array2<u8>> {
        let (height, width, channels) = image.dim();
        if channels != 3 {
            return Err(ClassifyError::InvalidInput(format!(
                "Grayscale conversion needs 3 channels, got {}",
                channels
            )));
        }

        let round = 1 << (YUV_SHIFT - 1);
        Ok(Array2::from_shape_fn((height, width), |(h, w)| {
            let r = image[[h, w, 0]] as i32;
            let g = image[[h, w, 1]] as i32;
            let b = image[[h, w, 2]] as i32;
            ((r * R2Y + g * G2Y + b * B2Y + round) >> YUV_SHIFT) as u8
        }))
    }
}

/// 饱和度与色相的定点倒数表
struct HsvTables {
    sdiv: [i32; 256],
    hdiv: [i32; 256],
}

impl HsvTables {
    fn new() -> Self {
        let mut sdiv = [0i32; 256];
        let mut hdiv = [0i32; 256];
        for i in 1..256 {
            sdiv[i] = ((255 << HSV_SHIFT) as f64 / i as f64).round() as i32;
            hdiv[i] = ((HUE_RANGE << HSV_SHIFT) as f64 / (6.0 * i as f64)).round() as i32;
        }
        Self { sdiv, hdiv }
    }

    fn convert(&self, r: u8, g: u8, b: u8) -> (u8, u8, u8) {
        let (r, g, b) = (r as i32, g as i32, b as i32);
        let v = r.max(g).max(b);
        let vmin = r.min(g).min(b);
        let diff = v - vmin;
        let round = 1 << (HSV_SHIFT - 1);

        let s = (diff * self.sdiv[v as usize] + round) >> HSV_SHIFT;

        // 最大值通道的优先级：R > G > B
        let h = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        let mut h = (h * self.hdiv[diff as usize] + round) >> HSV_SHIFT;
        if h < 0 {
            h += HUE_RANGE;
        }

        (h as u8, s as u8, v as u8)
    }
}
