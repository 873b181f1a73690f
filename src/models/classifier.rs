use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// 分类器能力接口：任何实现了 `predict` / `predict_proba` 的模型都可替换使用
///
/// 输入为批次矩阵 (batch, n_features)，每行一个样本。
pub trait Classifier: Send + Sync {
    /// 模型名称（用于日志与服务信息）
    fn name(&self) -> &str;

    /// 类别标签，顺序与概率列一致
    fn classes(&self) -> &[String];

    /// 模型期望的特征长度（未知时为None）
    fn n_features(&self) -> Option<usize>;

    /// 每行返回各类别概率
    fn predict_proba(&self, batch: ArrayView2<'_, f32>) -> Result<Array2<f32>>;

    /// 每行返回概率最大的类别
    fn predict(&self, batch: ArrayView2<'_, f32>) -> Result<Vec<String>> {
        let proba = self.predict_proba(batch)?;
        proba
            .rows()
            .into_iter()
            .map(|row| {
                let idx = argmax(row).ok_or_else(|| {
                    ClassifyError::Inference("Empty probability row".to_string())
                })?;
                self.classes().get(idx).cloned().ok_or_else(|| {
                    ClassifyError::Inference(format!(
                        "Class index {} out of range for {} classes",
                        idx,
                        self.classes().len()
                    ))
                })
            })
            .collect()
    }
}

/// 第一个最大值的下标（与numpy argmax一致）
pub fn argmax(row: ArrayView1<'_, f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in row.iter().enumerate() {
        match best {
            Some((_, max)) if p <= max => {}
            _ => best = Some((i, p)),
        }
    }
    best.map(|(i, _)| i)
}

/// 校验批次的列数
pub fn check_batch(batch: &ArrayView2<'_, f32>, n_features: Option<usize>) -> Result<()> {
    if batch.nrows() == 0 {
        return Err(ClassifyError::InvalidInput("Empty feature batch".to_string()));
    }
    if let Some(expected) = n_features {
        if batch.ncols() != expected {
            return Err(ClassifyError::FeatureShape {
                expected,
                actual: batch.ncols(),
            });
        }
    }
    Ok(())
}
