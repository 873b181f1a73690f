use anyhow::{bail, Result};
use std::path::PathBuf;

/// 默认模型路径（训练流程产出的固定位置）
pub const DEFAULT_MODEL_PATH: &str = "ml_model/mlp_color_texture.onnx";

/// 单张图像的最大字节数 (50MB)
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// 模型文件路径
    pub model_path: PathBuf,

    /// 图像抓取配置
    pub fetch: FetchConfig,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// 请求超时时间（秒）
    pub timeout_secs: u64,

    /// 最大响应体大小（字节）
    pub max_bytes: usize,

    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别 (0-3)
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: MAX_IMAGE_BYTES,
            user_agent: format!("image-classifier/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            intra_threads: (num_cpus::get() * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5005".to_string(),
            request_timeout: 60,
            max_request_size: MAX_IMAGE_BYTES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            fetch: FetchConfig::default(),
            onnx_config: OnnxConfig::default(),
            server_config: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn new(
        model_path: Option<String>,
        timeout_secs: Option<u64>,
        bind_addr: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = model_path {
            config.model_path = PathBuf::from(path);
        }
        if let Some(timeout) = timeout_secs {
            config.fetch.timeout_secs = timeout;
        }
        if let Some(bind) = bind_addr {
            config.server_config.bind_addr = bind;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            bail!("model path must not be empty");
        }
        if self.fetch.timeout_secs == 0 {
            bail!("fetch timeout must be at least 1 second");
        }
        if self.fetch.max_bytes == 0 {
            bail!("max image size must be greater than zero");
        }
        if !(0..=3).contains(&self.onnx_config.optimization_level) {
            bail!(
                "invalid ONNX optimization level {}, expected 0-3",
                self.onnx_config.optimization_level
            );
        }
        Ok(())
    }

    /// 获取ONNX模型的元数据文件路径 (`<model>.meta.json`)
    pub fn metadata_path(&self) -> PathBuf {
        self.model_path.with_extension("meta.json")
    }
}
