use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP {0} for: {1}")]
    HttpStatus(u16, String),

    #[error("Empty content from: {0}")]
    EmptyContent(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model artifact load failed: {0}")]
    ArtifactLoad(String),

    #[error("Feature length mismatch: expected {expected}, got {actual}")]
    FeatureShape { expected: usize, actual: usize },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClassifyError {
    /// 部署/启动类错误（模型文件缺失、损坏）
    pub fn is_startup_error(&self) -> bool {
        matches!(self, ClassifyError::ArtifactLoad(_))
    }

    /// 单次请求的输入错误
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ClassifyError::Fetch { .. }
                | ClassifyError::HttpStatus(_, _)
                | ClassifyError::EmptyContent(_)
                | ClassifyError::FileTooLarge(_, _)
                | ClassifyError::ImageDecode(_)
                | ClassifyError::InvalidInput(_)
                | ClassifyError::Base64(_)
        )
    }

    /// 进程退出码，永不为0
    pub fn exit_code(&self) -> i32 {
        if self.is_input_error() {
            2
        } else if self.is_startup_error() {
            3
        } else {
            match self {
                ClassifyError::FeatureShape { .. } | ClassifyError::Inference(_) | ClassifyError::Ort(_) => 4,
                _ => 1,
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::Fetch { .. } | ClassifyError::HttpStatus(_, _) => StatusCode::BAD_GATEWAY,
            ClassifyError::EmptyContent(_) => StatusCode::BAD_GATEWAY,
            ClassifyError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifyError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ClassifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClassifyError::Base64(_) => StatusCode::BAD_REQUEST,
            ClassifyError::Json(_) => StatusCode::BAD_REQUEST,
            ClassifyError::ArtifactLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifyError::Fetch { .. } => "FETCH_ERROR",
            ClassifyError::HttpStatus(_, _) => "HTTP_STATUS_ERROR",
            ClassifyError::EmptyContent(_) => "EMPTY_CONTENT",
            ClassifyError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            ClassifyError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            ClassifyError::InvalidInput(_) => "INVALID_INPUT",
            ClassifyError::ArtifactLoad(_) => "ARTIFACT_LOAD_ERROR",
            ClassifyError::FeatureShape { .. } => "FEATURE_SHAPE_MISMATCH",
            ClassifyError::Inference(_) => "INFERENCE_ERROR",
            ClassifyError::Config(_) => "CONFIG_ERROR",
            ClassifyError::Io(_) => "IO_ERROR",
            ClassifyError::Json(_) => "JSON_ERROR",
            ClassifyError::Base64(_) => "BASE64_DECODE_ERROR",
            ClassifyError::Ort(_) => "ORT_ERROR",
            ClassifyError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "request_id": uuid::Uuid::new_v4().to_string(),
        });

        tracing::error!("Request failed: {} ({})", self, status);

        (status, axum::Json(error_response)).into_response()
    }
}
