use ndarray::Array2;
use std::f64::consts::PI;

/// 邻域采样点数
pub const LBP_POINTS: usize = 8;

/// 邻域半径（像素）
pub const LBP_RADIUS: f64 = 1.0;

/// 纹理直方图长度：边界 0..=9 产生 9 个箱，最后一个箱为闭区间 [8, 9]
pub const TEXTURE_FEATURE_LEN: usize = LBP_POINTS + 1;

/// 归一化时防止除零
pub const TEXTURE_EPSILON: f64 = 1e-6;

/// 旋转不变的 uniform 局部二值模式
///
/// 均匀模式的编码为置位数 (0..=P)，非均匀模式统一编码为 P + 1。
/// 邻域值用双线性插值取得，图像外部视为 0。
pub struct LocalBinaryPattern {
    points: usize,
    row_offsets: Vec<f64>,
    col_offsets: Vec<f64>,
}

impl Default for LocalBinaryPattern {
    fn default() -> Self {
        Self::uniform(LBP_POINTS, LBP_RADIUS)
    }
}

impl LocalBinaryPattern {
    pub fn uniform(points: usize, radius: f64) -> Self {
        let (row_offsets, col_offsets) = (0..points)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / points as f64;
                (round5(-radius * angle.sin()), round5(radius * angle.cos()))
            })
            .unzip();

        Self {
            points,
            row_offsets,
            col_offsets,
        }
    }

    /// 非均匀模式的编码
    pub fn non_uniform_code(&self) -> u8 {
        (self.points + 1) as u8
    }

    /// 逐像素计算模式编码
    pub fn compute(&self, gray: &Array2<u8>) -> Array2<u8> {
        let (rows, cols) = gray.dim();
        let image = gray.mapv(f64::from);
        let mut codes = Array2::<u8>::zeros((rows, cols));
        let mut signs = vec![0u8; self.points];

        for r in 0..rows {
            for c in 0..cols {
                let center = image[[r, c]];

                for (i, sign) in signs.iter_mut().enumerate() {
                    let value = bilinear(
                        &image,
                        r as f64 + self.row_offsets[i],
                        c as f64 + self.col_offsets[i],
                    );
                    *sign = u8::from(value - center >= 0.0);
                }

                // 只统计相邻采样点之间的跳变，不含首尾回绕
                let changes = signs.windows(2).filter(|w| w[0] != w[1]).count();

                codes[[r, c]] = if changes <= 2 {
                    signs.iter().sum()
                } else {
                    self.non_uniform_code()
                };
            }
        }

        codes
    }
}

/// 模式编码直方图
pub struct TextureHistogram;

impl TextureHistogram {
    /// 统计 0..=9 的编码，8 和 9 落入同一个末尾箱
    pub fn counts(codes: &Array2<u8>) -> [u64; TEXTURE_FEATURE_LEN] {
        let mut hist = [0u64; TEXTURE_FEATURE_LEN];
        for &code in codes.iter() {
            let bin = (code as usize).min(TEXTURE_FEATURE_LEN - 1);
            hist[bin] += 1;
        }
        hist
    }

    /// `hist / (sum + eps)`
    pub fn compute(codes: &Array2<u8>) -> Vec<f32> {
        let counts = Self::counts(codes);
        let total = counts.iter().sum::<u64>() as f64 + TEXTURE_EPSILON;
        counts.iter().map(|&n| (n as f64 / total) as f32).collect()
    }
}

/// 保留5位小数（四舍六入五成双）
fn round5(x: f64) -> f64 {
    (x * 1e5).round_ties_even() / 1e5
}

fn pixel(image: &Array2<f64>, r: isize, c: isize) -> f64 {
    let (rows, cols) = image.dim();
    if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
        0.0
    } else {
        image[[r as usize, c as usize]]
    }
}

/// 双线性插值，运算顺序固定以保证结果逐位一致
fn bilinear(image: &Array2<f64>, r: f64, c: f64) -> f64 {
    let minr = r.floor();
    let minc = c.floor();
    let maxr = r.ceil();
    let maxc = c.ceil();
    let dr = r - minr;
    let dc = c - minc;

    let top_left = pixel(image, minr as isize, minc as isize);
    let top_right = pixel(image, minr as isize, maxc as isize);
    let bottom_left = pixel(image, maxr as isize, minc as isize);
    let bottom_right = pixel(image, maxr as isize, maxc as isize);

    let top = (1.0 - dc) * top_left + dc * top_right;
    let bottom = (1.0 - dc) * bottom_left + dc * bottom_right;
    (1.0 - dr) * top + dr * bottom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(size: usize, value: u8) -> Array2<u8> {
        Array2::from_elem((size, size), value)
    }

    #[test]
    fn test_sample_offsets() {
        let lbp = LocalBinaryPattern::default();
        let expected_rows = [0.0, -0.70711, -1.0, -0.70711, 0.0, 0.70711, 1.0, 0.70711];
        let expected_cols = [1.0, 0.70711, 0.0, -0.70711, -1.0, -0.70711, 0.0, 0.70711];
        assert_eq!(lbp.row_offsets, expected_rows);
        assert_eq!(lbp.col_offsets, expected_cols);
    }

    #[test]
    fn test_flat_image_fixture() {
        // 固定回归值：内部像素全部为编码8，边界像素因外部补0产生其他编码
        let codes = LocalBinaryPattern::default().compute(&flat(128, 76));
        let counts = TextureHistogram::counts(&codes);
        assert_eq!(counts, [0, 0, 0, 4, 0, 504, 0, 0, 15876]);
    }

    #[test]
    fn test_flat_black_image_is_all_uniform() {
        let codes = LocalBinaryPattern::default().compute(&flat(128, 0));
        let counts = TextureHistogram::counts(&codes);
        assert_eq!(counts[8], 128 * 128);
        let hist = TextureHistogram::compute(&codes);
        assert!((hist[8] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_corner_and_edge_codes() {
        let codes = LocalBinaryPattern::default().compute(&flat(5, 200));
        // 角点：只有指向内部的3个邻域点置位
        assert_eq!(codes[[0, 0]], 3);
        // 边：5个邻域点在图像内
        assert_eq!(codes[[0, 2]], 5);
        assert_eq!(codes[[2, 2]], 8);
    }

    #[test]
    fn test_non_uniform_pattern() {
        // 上下左右更亮、四角更暗：邻域符号交替
        let image = Array2::from_shape_vec((3, 3), vec![0u8, 200, 0, 200, 100, 200, 0, 200, 0]).unwrap();
        let codes = LocalBinaryPattern::default().compute(&image);
        assert_eq!(codes[[1, 1]], 9);
    }

    #[test]
    fn test_histogram_merges_last_two_codes() {
        let codes = Array2::from_shape_vec((1, 4), vec![0u8, 8, 9, 9]).unwrap();
        let counts = TextureHistogram::counts(&codes);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[8], 3);
    }

    #[test]
    fn test_histogram_sums_to_one() {
        let image = Array2::from_shape_fn((16, 16), |(r, c)| ((r * 31 + c * 17) % 256) as u8);
        let hist = TextureHistogram::compute(&LocalBinaryPattern::default().compute(&image));
        assert_eq!(hist.len(), TEXTURE_FEATURE_LEN);
        let sum: f32 = hist.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
