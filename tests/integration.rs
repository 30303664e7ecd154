use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn qa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_qa"))
}

const CHECKOUT_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
  <input type="text" id="discountCode" placeholder="Enter discount code">
  <button id="applyDiscount" onclick="applyDiscount()">Apply</button>
  <p id="total">Total: $0.00</p>
  <form id="checkoutForm">
    <input type="text" id="name" name="name">
    <input type="email" id="email" name="email">
    <button type="button" id="payNow">Pay Now</button>
  </form>
</body>
</html>"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(docs_dir.join("guides")).unwrap();
    fs::write(
        docs_dir.join("product_specs.md"),
        "# Product Specifications\n\n## Discount Codes\nThe discount code SAVE15 applies a 15% discount to the cart total.\nInvalid codes must show an error message.\n\n## Shipping\nStandard shipping is free. Express shipping costs $10.\n",
    )
    .unwrap();
    fs::write(
        docs_dir.join("guides/ui_ux_guide.txt"),
        "Error messages must be displayed in red below the field.\nThe Pay Now button should be green.\n",
    )
    .unwrap();
    fs::write(
        docs_dir.join("api.json"),
        r#"{"endpoint":"/checkout","fields":["name","email","address"]}"#,
    )
    .unwrap();
    fs::write(docs_dir.join("logo.png"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();
    fs::write(root.join("checkout.html"), CHECKOUT_HTML).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/qa.sqlite"

[chunking]
chunk_size = 400
overlap = 80

[retrieval]
top_k = 8
script_context_k = 3
"#,
        root.display()
    );

    let config_path = config_dir.join("qa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_qa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = qa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("GEMINI_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run qa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn docs_dir(config_path: &Path) -> String {
    let root = config_path.parent().unwrap().parent().unwrap();
    root.join("docs").to_string_lossy().to_string()
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_qa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_qa(&config_path, &["init"]);
    assert!(success, "Second init failed (not idempotent)");
}

#[test]
fn test_index_and_list_sources() {
    let (_tmp, config_path) = setup_test_env();
    let docs = docs_dir(&config_path);

    let (stdout, stderr, success) = run_qa(&config_path, &["index", &docs]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents: 3"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));

    let (stdout, _, success) = run_qa(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("product_specs.md"));
    assert!(stdout.contains("guides/ui_ux_guide.txt"));
    assert!(stdout.contains("api.json"));
    assert!(!stdout.contains("logo.png"));
}

#[test]
fn test_reindex_replaces_previous_index() {
    let (tmp, config_path) = setup_test_env();
    let docs = docs_dir(&config_path);
    run_qa(&config_path, &["index", &docs]);

    let single = tmp.path().join("docs/product_specs.md");
    let (_, stderr, success) = run_qa(&config_path, &["index", single.to_str().unwrap()]);
    assert!(success, "reindex failed: {}", stderr);

    let (stdout, _, _) = run_qa(&config_path, &["sources"]);
    assert!(stdout.contains("product_specs.md"));
    assert!(!stdout.contains("api.json"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();
    let docs = docs_dir(&config_path);

    let (stdout, _, success) = run_qa(&config_path, &["index", &docs, "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("product_specs.md"));

    let (stdout, _, _) = run_qa(&config_path, &["sources"]);
    assert!(stdout.contains("No documents indexed"));
}

#[test]
fn test_generate_without_documents_is_informational() {
    let (_tmp, config_path) = setup_test_env();
    run_qa(&config_path, &["init"]);

    let (stdout, stderr, success) = run_qa(&config_path, &["generate", "discount code"]);
    assert!(success, "generate failed: {}", stderr);

    let cases: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(cases.as_array().unwrap().len(), 1);
    assert_eq!(cases[0]["test_id"], "TC-001");
    assert_eq!(cases[0]["test_type"], "informational");
    assert_eq!(cases[0]["grounded_in"], "No source");
}

#[test]
fn test_generate_discount_cases_from_rules() {
    let (_tmp, config_path) = setup_test_env();
    let docs = docs_dir(&config_path);
    run_qa(&config_path, &["index", &docs]);

    let (stdout, stderr, success) =
        run_qa(&config_path, &["generate", "discount code validation"]);
    assert!(success, "generate failed: {}", stderr);
    assert!(stderr.contains("rules"), "stderr={}", stderr);

    let cases: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let cases = cases.as_array().unwrap();
    assert!(cases
        .iter()
        .any(|c| c["test_scenario"].as_str().unwrap().contains("SAVE15")));
    assert!(cases.iter().any(|c| c["test_type"] == "negative"));
    assert!(cases
        .iter()
        .all(|c| !c["grounded_in"].as_str().unwrap().is_empty()));
}

#[test]
fn test_script_uses_page_selectors() {
    let (tmp, config_path) = setup_test_env();
    let docs = docs_dir(&config_path);
    run_qa(&config_path, &["index", &docs]);

    let cases_path = tmp.path().join("cases.json");
    let (_, stderr, success) = run_qa(
        &config_path,
        &["generate", "discount code", "--output", cases_path.to_str().unwrap()],
    );
    assert!(success, "generate failed: {}", stderr);

    let markup = tmp.path().join("checkout.html");
    let (stdout, stderr, success) = run_qa(
        &config_path,
        &[
            "script",
            "--test-cases",
            cases_path.to_str().unwrap(),
            "--markup",
            markup.to_str().unwrap(),
        ],
    );
    assert!(success, "script failed: {}", stderr);
    assert!(stdout.contains("#applyDiscount"));
    assert!(stdout.contains("#discountCode"));
    assert!(stdout.contains("class TestTC_001"));
    assert!(stdout.contains("if __name__ == \"__main__\":"));
}

#[test]
fn test_script_unknown_test_id_fails() {
    let (tmp, config_path) = setup_test_env();
    let cases_path = tmp.path().join("cases.json");
    fs::write(
        &cases_path,
        r#"[{"test_id":"TC-001","feature":"Cart","test_scenario":"Add","expected_result":"Added"}]"#,
    )
    .unwrap();
    let markup = tmp.path().join("checkout.html");

    let (_, stderr, success) = run_qa(
        &config_path,
        &[
            "script",
            "--test-cases",
            cases_path.to_str().unwrap(),
            "--test-id",
            "TC-404",
            "--markup",
            markup.to_str().unwrap(),
        ],
    );
    assert!(!success);
    assert!(stderr.contains("TC-404"));
}

#[test]
fn test_process_prints_document_json() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("docs/api.json");

    let (stdout, stderr, success) = run_qa(&config_path, &["process", file.to_str().unwrap()]);
    assert!(success, "process failed: {}", stderr);

    let doc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(doc["filename"], "api.json");
    assert_eq!(doc["content_type"], "application/json");
    assert_eq!(doc["metadata"]["chunk_count"], 1);
    assert!(doc["text_content"].as_str().unwrap().contains("\"endpoint\": \"/checkout\""));
}

#[test]
fn test_process_empty_document_fails() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("empty.md");
    fs::write(&file, "  \n").unwrap();

    let (_, stderr, success) = run_qa(&config_path, &["process", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Error processing empty.md"));
}

#[test]
fn test_clear_empties_index() {
    let (_tmp, config_path) = setup_test_env();
    let docs = docs_dir(&config_path);
    run_qa(&config_path, &["index", &docs]);

    let (stdout, _, success) = run_qa(&config_path, &["clear"]);
    assert!(success);
    assert!(stdout.contains("Cleared"));

    let (stdout, _, _) = run_qa(&config_path, &["sources"]);
    assert!(stdout.contains("No documents indexed"));
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(&config_path, "[chunking]\nchunk_size = 10\noverlap = 20\n").unwrap();

    let (_, stderr, success) = run_qa(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunking.overlap"));
}

#[test]
fn test_errors_report_cause_chain() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("missing.md");

    let (stdout, stderr, success) = run_qa(&config_path, &["process", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Error: Failed to read"), "stderr={}", stderr);
    assert!(stderr.contains("Caused by:"), "stderr={}", stderr);
}
