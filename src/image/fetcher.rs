use crate::config::FetchConfig;
use crate::utils::error::ClassifyError;
use crate::Result;
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::debug;
use url::Url;

/// 图像来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Remote(Url),
    Local(PathBuf),
}

impl ImageSource {
    /// 解析来源字符串：http(s) URL、file:// URL 或本地路径
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ClassifyError::InvalidInput("Empty image source".to_string()));
        }

        match Url::parse(source) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(Self::Local)
                    .map_err(|_| ClassifyError::InvalidInput(format!("Invalid file URL: {}", source))),
                // Windows盘符会被解析成单字母scheme
                scheme if scheme.len() == 1 => Ok(Self::Local(PathBuf::from(source))),
                scheme => Err(ClassifyError::InvalidInput(format!(
                    "Unsupported URL scheme '{}': {}",
                    scheme, source
                ))),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Self::Local(PathBuf::from(source))),
            Err(e) => Err(ClassifyError::InvalidInput(format!(
                "Invalid image URL {}: {}",
                source, e
            ))),
        }
    }
}

impl ImageSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{}", url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// 图像字节抓取器，读取过程中强制大小上限，不重试
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ClassifyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// 获取原始字节，失败即返回，不重试
    pub async fn fetch(&self, source: &ImageSource) -> Result<Vec<u8>> {
        let bytes = match source {
            ImageSource::Remote(url) => self.fetch_remote(url).await?,
            ImageSource::Local(path) => self.fetch_local(path).await?,
        };

        if bytes.is_empty() {
            return Err(ClassifyError::EmptyContent(source.to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(ClassifyError::FileTooLarge(bytes.len(), self.max_bytes));
        }

        debug!("Fetched {} bytes from {}", bytes.len(), source);
        Ok(bytes)
    }

    async fn fetch_remote(&self, url: &Url) -> Result<Vec<u8>> {
        debug!("Fetching image from: {}", url);

        let fetch_error = |e: reqwest::Error| ClassifyError::Fetch {
            url: url.to_string(),
            reason: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            },
        };

        let mut response = self.client.get(url.clone()).send().await.map_err(fetch_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::HttpStatus(status.as_u16(), url.to_string()));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(ClassifyError::FileTooLarge(length as usize, self.max_bytes));
            }
        }

        // 分块读取，超出上限立即中止（chunked响应没有Content-Length）
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(ClassifyError::FileTooLarge(body.len() + chunk.len(), self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    async fn fetch_local(&self, path: &Path) -> Result<Vec<u8>> {
        debug!("Reading image from: {}", path.display());

        let io_error = |e: std::io::Error| ClassifyError::Fetch {
            url: path.display().to_string(),
            reason: e.to_string(),
        };

        let metadata = tokio::fs::metadata(path).await.map_err(io_error)?;
        // 设备文件、FIFO的长度为0，只接受普通文件
        if !metadata.is_file() {
            return Err(ClassifyError::InvalidInput(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }
        if metadata.len() > self.max_bytes as u64 {
            return Err(ClassifyError::FileTooLarge(metadata.len() as usize, self.max_bytes));
        }

        // 文件可能在检查后增长，读取时再限一次
        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        file.take(self.max_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .await
            .map_err(io_error)?;

        if bytes.len() > self.max_bytes {
            return Err(ClassifyError::FileTooLarge(bytes.len(), self.max_bytes));
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fetcher() -> ImageFetcher {
        limited_fetcher(FetchConfig::default().max_bytes)
    }

    fn limited_fetcher(max_bytes: usize) -> ImageFetcher {
        ImageFetcher::new(&FetchConfig {
            timeout_secs: 2,
            max_bytes,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    /// 本地HTTP服务：返回无Content-Length的chunked响应体
    async fn chunked_server(chunks: usize, chunk_size: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let header = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(header.as_bytes()).await.is_err() {
                return;
            }
            let payload = vec![b'x'; chunk_size];
            for _ in 0..chunks {
                let frame = format!("{:x}\r\n", chunk_size);
                if socket.write_all(frame.as_bytes()).await.is_err()
                    || socket.write_all(&payload).await.is_err()
                    || socket.write_all(b"\r\n").await.is_err()
                {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });

        format!("http://{}/image.png", addr)
    }

    #[test]
    fn test_parse_remote() {
        let source = ImageSource::parse("https://example.com/cat.jpg").unwrap();
        assert!(matches!(source, ImageSource::Remote(ref u) if u.host_str() == Some("example.com")));
    }

    #[test]
    fn test_parse_local_path() {
        assert_eq!(
            ImageSource::parse("images/cat.png").unwrap(),
            ImageSource::Local(PathBuf::from("images/cat.png"))
        );
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(matches!(
            ImageSource::parse("ftp://example.com/cat.png"),
            Err(ClassifyError::InvalidInput(_))
        ));
        assert!(ImageSource::parse("   ").is_err());
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();

        let source = ImageSource::Local(file.path().to_path_buf());
        let bytes = fetcher().fetch(&source).await.unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[tokio::test]
    async fn test_fetch_empty_file_is_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = ImageSource::Local(file.path().to_path_buf());
        let result = fetcher().fetch(&source).await;
        assert!(matches!(result, Err(ClassifyError::EmptyContent(_))));
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fetch_error() {
        let source = ImageSource::Local(PathBuf::from("/definitely/not/here.png"));
        let result = fetcher().fetch(&source).await;
        assert!(matches!(result, Err(ClassifyError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        // 端口1上没有服务，连接会被立即拒绝
        let source = ImageSource::parse("http://127.0.0.1:1/image.png").unwrap();
        let result = fetcher().fetch(&source).await;
        assert!(matches!(result, Err(ClassifyError::Fetch { .. })));
    }

    #[test]
    fn test_is_remote() {
        assert!(ImageSource::parse("http://example.com/a.png").unwrap().is_remote());
        assert!(!ImageSource::parse("/tmp/a.png").unwrap().is_remote());
        assert!(!ImageSource::parse("file:///tmp/a.png").unwrap().is_remote());
    }

    #[tokio::test]
    async fn test_fetch_local_over_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 100]).unwrap();

        let source = ImageSource::Local(file.path().to_path_buf());
        let result = limited_fetcher(16).fetch(&source).await;
        assert!(matches!(result, Err(ClassifyError::FileTooLarge(100, 16))));
    }

    #[tokio::test]
    async fn test_fetch_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSource::Local(dir.path().to_path_buf());
        let result = fetcher().fetch(&source).await;
        assert!(matches!(result, Err(ClassifyError::InvalidInput(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_device_file_rejected() {
        // /dev/zero 长度为0但可无限读取
        let source = ImageSource::parse("/dev/zero").unwrap();
        let result = limited_fetcher(1024).fetch(&source).await;
        assert!(matches!(result, Err(ClassifyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_fetch_chunked_body_over_limit() {
        let url = chunked_server(64, 1024).await;
        let source = ImageSource::parse(&url).unwrap();

        let result = limited_fetcher(4096).fetch(&source).await;
        assert!(matches!(result, Err(ClassifyError::FileTooLarge(_, 4096))));
    }

    #[tokio::test]
    async fn test_fetch_chunked_body_within_limit() {
        let url = chunked_server(3, 100).await;
        let source = ImageSource::parse(&url).unwrap();

        let bytes = limited_fetcher(4096).fetch(&source).await.unwrap();
        assert_eq!(bytes.len(), 300);
    }
}
