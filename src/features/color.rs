use crate::image::transforms::HUE_RANGE;
use ndarray::Array3;

/// 每个通道的分箱数
pub const COLOR_BINS_PER_CHANNEL: usize = 8;

/// 颜色直方图长度 (8 x 8 x 8)
pub const COLOR_FEATURE_LEN: usize =
    COLOR_BINS_PER_CHANNEL * COLOR_BINS_PER_CHANNEL * COLOR_BINS_PER_CHANNEL;

/// HSV三通道联合直方图，L2归一化后按 H、S、V 顺序展平
pub struct ColorHistogram {
    /// 每个通道 8 位取值到分箱的查找表
    lookup: [[usize; 256]; 3],
    bins: usize,
}

impl Default for ColorHistogram {
    fn default() -> Self {
        Self::new(
            COLOR_BINS_PER_CHANNEL,
            [(0.0, HUE_RANGE as f64), (0.0, 256.0), (0.0, 256.0)],
        )
    }
}

impl ColorHistogram {
    /// `ranges` 为半开区间 [lo, hi)，超出范围的取值不计入直方图
    pub fn new(bins: usize, ranges: [(f64, f64); 3]) -> Self {
        let mut lookup = [[usize::MAX; 256]; 3];

        for (table, (lo, hi)) in lookup.iter_mut().zip(ranges) {
            let a = bins as f64 / (hi - lo);
            let b = -a * lo;
            for (j, slot) in table.iter_mut().enumerate() {
                let idx = (j as f64 * a + b).floor();
                if idx >= 0.0 && (idx as usize) < bins {
                    *slot = idx as usize;
                }
            }
        }

        Self { lookup, bins }
    }

    pub fn len(&self) -> usize {
        self.bins * self.bins * self.bins
    }

    pub fn is_empty(&self) -> bool {
        self.bins == 0
    }

    /// 统计原始计数（未归一化）
    pub fn counts(&self, hsv: &Array3<u8>) -> Vec<f32> {
        let mut hist = vec![0f32; self.len()];
        let stride_h = self.bins * self.bins;

        for pixel in hsv.rows() {
            let h = self.lookup[0][pixel[0] as usize];
            let s = self.lookup[1][pixel[1] as usize];
            let v = self.lookup[2][pixel[2] as usize];
            if h == usize::MAX || s == usize::MAX || v == usize::MAX {
                continue;
            }
            hist[h * stride_h + s * self.bins + v] += 1.0;
        }

        hist
    }

    /// 计数后做L2归一化
    pub fn compute(&self, hsv: &Array3<u8>) -> Vec<f32> {
        let mut hist = self.counts(hsv);
        normalize_l2(&mut hist);
        hist
    }
}

/// 单位L2范数归一化；全零向量保持不变
pub fn normalize_l2(values: &mut [f32]) {
    let norm = values
        .iter()
        .map(|&v| (v as f64) * (v as f64))
        .sum::<f64>()
        .sqrt();

    if norm <= f64::EPSILON {
        return;
    }

    let scale = 1.0 / norm;
    for v in values.iter_mut() {
        *v = (*v as f64 * scale) as f32;
    }
}
