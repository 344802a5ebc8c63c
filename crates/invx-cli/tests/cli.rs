use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "GEMINI_API_KEY",
    "ANTHROPIC_API_KEY",
    "OPENAI_MODEL",
    "GEMINI_MODEL",
    "ANTHROPIC_MODEL",
    "OPENAI_BASE_URL",
    "GEMINI_BASE_URL",
    "ANTHROPIC_BASE_URL",
    "MAX_FILE_SIZE_MB",
    "RUST_LOG",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
];

const COMPLETION: &str = r#"{"choices":[{"message":{"role":"assistant","content":"```json\n{\"invoice_number\": \"INV-2024-001\", \"date\": \"2024-03-15\", \"vendor\": {\"name\": \"Acme Corp\"}, \"totals\": {\"subtotal\": \"100.00\", \"tax\": \"8.00\", \"total\": \"108.00\", \"currency\": \"EUR\"}, \"line_items\": [{\"description\": \"Widget\", \"quantity\": 2, \"unit_price\": \"50.00\", \"total\": \"100.00\"}]}\n```"}}]}"#;

/// A command with a clean environment, run from inside `dir`.
fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("invoice-extractor").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("NO_PROXY", "127.0.0.1,localhost").current_dir(dir.path());
    cmd
}

fn png_invoice(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("invoice.png");
    image::RgbImage::new(16, 16).save(&path).unwrap();
    path
}

/// Serve one canned chat completion on a loopback port.
fn serve_completion(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else {
            return;
        };
        let mut reader = BufReader::new(stream);
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                break;
            }
            let lower = line.to_ascii_lowercase();
            if let Some(value) = lower.strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        let mut request = vec![0u8; content_length];
        let _ = reader.read_exact(&mut request);

        let mut stream = reader.into_inner();
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.flush();
    });

    format!("http://{}/v1", addr)
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("invoice-extractor"));
}

#[test]
fn test_missing_input_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("missing.pdf")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_no_backend_configured() {
    let dir = TempDir::new().unwrap();
    let input = png_invoice(&dir);

    cli(&dir)
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No AI provider configured"))
        .stderr(predicate::str::contains("OPENAI_API_KEY for OpenAI GPT models"));

    assert!(!dir.path().join("invoice.json").exists());
}

#[test]
fn test_oversized_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("big.pdf");
    let mut content = b"%PDF-1.7\n".to_vec();
    content.resize(2 * 1024 * 1024, b' ');
    std::fs::write(&input, content).unwrap();

    cli(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .env("MAX_FILE_SIZE_MB", "1")
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "File validation failed: File size (2.0MB) exceeds limit (1MB)",
        ));
}

#[test]
fn test_unsupported_content() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("invoice.pdf");
    std::fs::write(&input, "Invoice INV-1\nTotal due: 10.00\n").unwrap();

    cli(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unsupported file type: text/plain"));
}

#[test]
fn test_invalid_size_limit() {
    let dir = TempDir::new().unwrap();
    let input = png_invoice(&dir);

    cli(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .env("MAX_FILE_SIZE_MB", "lots")
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("MAX_FILE_SIZE_MB"));
}

#[test]
fn test_successful_extraction() {
    let dir = TempDir::new().unwrap();
    let input = png_invoice(&dir);
    let base_url = serve_completion(COMPLETION);

    cli(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .env("OPENAI_MODEL", "gpt-test-vision")
        .env("OPENAI_BASE_URL", &base_url)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processing completed successfully!"))
        .stdout(predicate::str::contains("Output saved to:"));

    let output = dir.path().join("invoice.json");
    let text = std::fs::read_to_string(&output).unwrap();
    assert!(!text.trim_end().contains('\n'));

    let value = read_json(&output);
    assert_eq!(value["success"], true);
    assert!(value["processing_time"].as_f64().unwrap() > 0.0);
    assert_eq!(value["confidence_score"], 0.9);
    assert_eq!(value["metadata"]["model_used"], "gpt-test-vision");

    let invoice = &value["invoice_data"];
    assert_eq!(invoice["invoice_number"], "INV-2024-001");
    assert_eq!(invoice["date"], "2024-03-15");
    assert_eq!(invoice["vendor"]["name"], "Acme Corp");
    assert_eq!(invoice["totals"]["total"], "108.00");
    assert_eq!(invoice["totals"]["currency"], "EUR");
    assert_eq!(invoice["line_items"][0]["description"], "Widget");
}

#[test]
fn test_pdf_input_defaults_output_next_to_it() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("march.pdf");
    std::fs::write(&input, b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n").unwrap();
    let base_url = serve_completion(COMPLETION);

    cli(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .env("OPENAI_BASE_URL", &base_url)
        .arg(&input)
        .assert()
        .success();

    let value = read_json(&dir.path().join("march.json"));
    assert_eq!(value["success"], true);
    assert_eq!(value["metadata"]["model_used"], "gpt-4o");
    assert_eq!(value["invoice_data"]["totals"]["subtotal"], "100.00");
}

#[test]
fn test_pretty_output_to_explicit_path() {
    let dir = TempDir::new().unwrap();
    let input = png_invoice(&dir);
    let base_url = serve_completion(COMPLETION);
    let output = dir.path().join("out").join("result.json");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();

    cli(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .env("OPENAI_BASE_URL", &base_url)
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--pretty")
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid png file"))
        .stdout(predicate::str::contains("Confidence score: 0.90"));

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.contains("\n  \"success\": true"));
    assert!(!dir.path().join("invoice.json").exists());
}

#[test]
fn test_backend_failure_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = png_invoice(&dir);

    cli(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .env("OPENAI_BASE_URL", "http://127.0.0.1:1/v1")
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Processing failed: "));

    assert!(!dir.path().join("invoice.json").exists());
}
