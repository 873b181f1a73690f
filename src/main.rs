use clap::Parser;
use image_classifier::{
    config::{Config, DEFAULT_MODEL_PATH},
    features::FeatureExtractor,
    image::{ImageFetcher, ImageLoader, ImageSource},
    models::load_classifier,
    web::{serve, AppState},
    ClassificationPipeline, ClassifyError, Result,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "image-classifier")]
#[command(about = "Classify an image by its colour and texture features")]
#[command(version)]
struct Args {
    /// Image URL or local path
    #[arg(required_unless_present = "serve")]
    url: Option<String>,

    /// Model artifact (.onnx with .meta.json sidecar, or MLP .json)
    #[arg(long, env = "CLASSIFIER_MODEL", default_value = DEFAULT_MODEL_PATH)]
    model: String,

    /// Fetch timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print the feature vector as JSON instead of classifying
    #[arg(long, conflicts_with = "serve")]
    dump_features: bool,

    /// Run the HTTP service
    #[arg(long, conflicts_with = "url")]
    serve: bool,

    /// Server bind address
    #[arg(long, requires = "serve")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // 日志只写stderr，stdout只留给结果行
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error[{}]: {}", e.error_code(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::new(Some(args.model), args.timeout, args.bind)
        .map_err(|e| ClassifyError::Config(e.to_string()))?;
    let fetcher = ImageFetcher::new(&config.fetch)?;

    if args.dump_features {
        let source = args.url.as_deref().unwrap_or_default();
        return dump_features(&fetcher, source).await;
    }

    // 先加载模型，模型缺失时不发起任何网络请求
    let classifier = load_classifier(&config)?;
    let pipeline = ClassificationPipeline::new(classifier, fetcher)?;

    if args.serve {
        tracing::info!("Starting image classifier service...");
        return serve(AppState::new(config, pipeline)).await;
    }

    let source = args.url.as_deref().unwrap_or_default();
    let prediction = pipeline.classify_source(source).await?;
    println!("{}", prediction);

    Ok(())
}

async fn dump_features(fetcher: &ImageFetcher, source: &str) -> Result<()> {
    let source = ImageSource::parse(source)?;
    let bytes = fetcher.fetch(&source).await?;
    let image = ImageLoader::from_bytes_limited(&bytes, fetcher.max_bytes())?;
    let features = FeatureExtractor::new().extract(&image)?;
    println!("{}", serde_json::to_string(&features)?);
    Ok(())
}
