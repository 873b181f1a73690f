use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// 预测结果：类别 + 置信度（最大类别概率）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "predictedClass")]
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: String, confidence: f32) -> Self {
        Self { label, confidence }
    }
}

/// 输出格式 `label|0.95`
impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{:.2}", self.label, self.confidence)
    }
}

/// 各阶段耗时
#[derive(Debug, Clone, Default, Serialize)]
pub struct InferenceStats {
    pub fetch_time_ms: u64,
    pub decode_time_ms: u64,
    pub extract_time_ms: u64,
    pub predict_time_ms: u64,
}

impl InferenceStats {
    pub fn total(&self) -> Duration {
        Duration::from_millis(
            self.fetch_time_ms + self.decode_time_ms + self.extract_time_ms + self.predict_time_ms,
        )
    }
}
