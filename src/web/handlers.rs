use crate::{
    image::{ImageLoader, ImageSource},
    inference::Prediction,
    utils::error::ClassifyError,
    web::{
        extractors::{RequestId, Validate, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// 预测请求：`url` 与 `image`（base64）二选一
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// 图像URL（仅http/https）
    #[serde(default)]
    pub url: Option<String>,

    /// Base64编码的图像数据
    #[serde(default)]
    pub image: Option<String>,
}

impl Validate for PredictRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        let has_url = self.url.as_deref().is_some_and(|s| !s.trim().is_empty());
        let has_image = self.image.as_deref().is_some_and(|s| !s.trim().is_empty());

        match (has_url, has_image) {
            (true, false) | (false, true) => Ok(()),
            (true, true) => Err("Provide either 'url' or 'image', not both".to_string()),
            (false, false) => Err("One of 'url' or 'image' is required".to_string()),
        }
    }
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: String,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// 预测处理器
pub async fn predict_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<PredictRequest>,
) -> Result<Json<ApiResponse<Prediction>>> {
    let start_time = Instant::now();

    let bytes = match (request.url, request.image) {
        (Some(url), _) if !url.trim().is_empty() => {
            tracing::info!("Processing predict request: request_id={}, url={}", request_id, url);
            let source = ImageSource::parse(&url)?;
            // 服务端只抓取远程URL，不读取本机文件
            if !source.is_remote() {
                return Err(ClassifyError::InvalidInput(
                    "Only http(s) URLs are accepted".to_string(),
                ));
            }
            state.pipeline.fetch(&source).await?
        }
        (_, Some(image)) => {
            tracing::info!(
                "Processing predict request: request_id={}, base64_len={}",
                request_id,
                image.len()
            );
            ImageLoader::decode_base64(&image)?
        }
        _ => return Err(ClassifyError::InvalidInput("No image source provided".to_string())),
    };

    let pipeline = state.pipeline.clone();
    // 解码与特征提取是CPU密集型，放到阻塞线程池
    let prediction = tokio::task::spawn_blocking(move || pipeline.classify_bytes(&bytes))
        .await
        .map_err(|e| ClassifyError::Internal(format!("Prediction task failed: {}", e)))??;

    tracing::info!(
        "Predict completed: request_id={}, result={}, time={:.3}s",
        request_id,
        prediction,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(prediction, request_id)))
}

/// 健康检查端点
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.pipeline.classifier().name(),
    }))
}

/// 服务信息端点
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let classifier = state.pipeline.classifier();
    Json(serde_json::json!({
        "service": "Image Classifier Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": crate::models::ModelStats::of(classifier.as_ref()),
        "model_path": state.config.model_path.display().to_string(),
        "feature_len": state.pipeline.extractor().feature_len(),
        "canonical_size": crate::features::CANONICAL_SIZE,
    }))
}
