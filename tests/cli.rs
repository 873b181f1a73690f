use image::{Rgb, RgbImage};
use image_classifier::features::FEATURE_LEN;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// 运行二进制，屏蔽可能影响结果的环境变量
fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_image-classifier"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("CLASSIFIER_MODEL")
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// 只对纯红颜色箱（下标63）敏感的MLP
fn write_red_mlp(dir: &Path) -> PathBuf {
    let mut weights = vec![vec![0.0f32, 0.0]; FEATURE_LEN];
    weights[63] = vec![-2.0, 2.0];

    let artifact = serde_json::json!({
        "classes": ["other", "red"],
        "n_features": FEATURE_LEN,
        "layers": [{ "weights": weights, "biases": [0.0, 0.0] }]
    });

    let path = dir.join("model.json");
    std::fs::write(&path, artifact.to_string()).unwrap();
    path
}

#[test]
fn test_prints_single_result_line() {
    let dir = TempDir::new().unwrap();
    let model = write_red_mlp(dir.path());
    let image = dir.path().join("red.png");
    RgbImage::from_pixel(128, 128, Rgb([255, 0, 0])).save(&image).unwrap();

    let output = run(&[
        "--model",
        model.to_str().unwrap(),
        image.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "{}", stderr(&output));
    // softmax([-2, 2]) 的最大分量约为0.982
    assert_eq!(String::from_utf8_lossy(&output.stdout), "red|0.98\n");
}

#[test]
fn test_unreachable_url_exits_with_input_error() {
    let dir = TempDir::new().unwrap();
    let model = write_red_mlp(dir.path());

    let output = run(&["--model", model.to_str().unwrap(), "http://127.0.0.1:1/cat.png"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("error[FETCH_ERROR]"), "{}", stderr(&output));
}

#[test]
fn test_non_image_exits_with_input_error() {
    let dir = TempDir::new().unwrap();
    let model = write_red_mlp(dir.path());
    let page = dir.path().join("page.html");
    std::fs::write(&page, "<html><body>hello</body></html>").unwrap();

    let output = run(&["--model", model.to_str().unwrap(), page.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("error[IMAGE_DECODE_ERROR]"), "{}", stderr(&output));
}

#[test]
fn test_missing_model_reported_before_fetch() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.onnx");

    let output = run(&["--model", missing.to_str().unwrap(), "http://127.0.0.1:1/cat.png"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    let err = stderr(&output);
    assert!(err.contains("error[ARTIFACT_LOAD_ERROR]"), "{err}");
    assert!(!err.contains("FETCH_ERROR"), "{err}");
}

#[test]
fn test_serve_conflicts_with_url() {
    let output = run(&["--serve", "http://example.com/cat.png"]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("cannot be used with"), "{}", stderr(&output));
}

#[test]
fn test_dump_features_without_model() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("grey.png");
    RgbImage::from_pixel(20, 20, Rgb([90, 90, 90])).save(&image).unwrap();
    let missing = dir.path().join("absent.onnx");

    let output = run(&[
        "--model",
        missing.to_str().unwrap(),
        "--dump-features",
        image.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["values"].as_array().unwrap().len(), FEATURE_LEN);
}
