use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn labelocr(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("labelocr").unwrap();
    cmd.env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .env_remove("GITHUB_TOKEN")
        .env_remove("LABELOCR_BACKEND");
    cmd
}

#[test]
fn process_rejects_unsupported_file_type() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("payload.exe");
    std::fs::write(&input, b"MZ").unwrap();

    labelocr(&dir)
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid file type"));
}

#[test]
fn process_reports_missing_input() {
    let dir = TempDir::new().unwrap();

    labelocr(&dir)
        .args(["process", "does-not-exist.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn health_prints_configured_models() {
    let dir = TempDir::new().unwrap();
    let ocr_model = if cfg!(feature = "tesseract") {
        "Tesseract"
    } else {
        "PaddleOCR (ort)"
    };

    labelocr(&dir)
        .args(["health", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("openai/gpt-4o-mini"))
        .stdout(predicate::str::contains(ocr_model));
}

#[test]
fn health_honours_backend_flag() {
    let dir = TempDir::new().unwrap();

    labelocr(&dir)
        .args(["health", "--json", "--backend", "light"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pure-onnx-ocr"));
}

#[test]
fn config_path_uses_explicit_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.json");

    labelocr(&dir)
        .arg("-c")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.json"));
}

#[test]
fn config_init_set_and_get() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("labelocr.json");

    labelocr(&dir)
        .arg("-c")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    labelocr(&dir)
        .arg("-c")
        .arg(&config)
        .args(["config", "get", "orientation.length_divisor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1000.0"));

    labelocr(&dir)
        .arg("-c")
        .arg(&config)
        .args(["config", "set", "extraction.model", "openai/gpt-4.1"])
        .assert()
        .success();

    labelocr(&dir)
        .arg("-c")
        .arg(&config)
        .args(["health", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("openai/gpt-4.1"));

    labelocr(&dir)
        .arg("-c")
        .arg(&config)
        .args(["config", "set", "extraction.nope", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}
