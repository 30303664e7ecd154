//! `qa script`: render a Selenium script for one test case.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use tracing::info;

use qa_harness_core::models::TestCase;
use qa_harness_core::script::generate_script;

use crate::config::Config;
use crate::sqlite_store::SqliteRetriever;

/// Parse a test-case file: either a JSON array (as printed by
/// `qa generate`) or a single test-case object.
pub fn read_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let cases = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(value)?],
        _ => bail!("{} must hold a test case or a list of test cases", path.display()),
    };
    Ok(cases)
}

/// Pick the case with `test_id`, or the first one.
pub fn select_test_case(cases: Vec<TestCase>, test_id: Option<&str>) -> Result<TestCase> {
    match test_id {
        Some(id) => cases
            .into_iter()
            .find(|c| c.test_id == id)
            .ok_or_else(|| anyhow!("Test case not found: {}", id)),
        None => cases
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Test case file is empty")),
    }
}

pub async fn run_script(
    config: &Config,
    test_cases: &Path,
    test_id: Option<&str>,
    markup: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let test_case = select_test_case(read_test_cases(test_cases)?, test_id)?;
    let markup = std::fs::read_to_string(markup)
        .with_context(|| format!("Failed to read {}", markup.display()))?;

    let retriever = SqliteRetriever::open(config).await?;
    let script = generate_script(
        &retriever,
        &test_case,
        &markup,
        config.retrieval.script_context_k,
    )
    .await?;
    retriever.close().await;

    info!(test_id = %test_case.test_id, "script rendered");

    match output {
        Some(path) => {
            std::fs::write(path, &script)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote script for {} to {}", test_case.test_id, path.display());
        }
        None => print!("{}", script),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    const CASES: &str = r#"[
        {"test_id": "TC-001", "feature": "Discount Code", "test_scenario": "Apply SAVE15",
         "expected_result": "15% off", "grounded_in": "specs.md", "test_type": "positive"},
        {"test_id": "TC-002", "feature": "Discount Code", "test_scenario": "Apply BOGUS",
         "expected_result": "Error shown", "grounded_in": ["specs.md"], "test_type": "negative"}
    ]"#;

    #[test]
    fn test_select_by_id_and_default() {
        let file = write_json(CASES);
        let cases = read_test_cases(file.path()).unwrap();
        assert_eq!(cases.len(), 2);

        let picked = select_test_case(cases.clone(), Some("TC-002")).unwrap();
        assert_eq!(picked.expected_result, "Error shown");
        assert_eq!(select_test_case(cases, None).unwrap().test_id, "TC-001");
    }

    #[test]
    fn test_single_object_accepted() {
        let file = write_json(
            r#"{"test_id": "TC-009", "feature": "Cart", "test_scenario": "Add",
                "expected_result": "Added"}"#,
        );
        let cases = read_test_cases(file.path()).unwrap();
        assert_eq!(cases[0].test_id, "TC-009");
        assert!(cases[0].steps.is_empty());
    }

    #[test]
    fn test_unknown_id_and_bad_shape() {
        let file = write_json(CASES);
        let cases = read_test_cases(file.path()).unwrap();
        let err = select_test_case(cases, Some("TC-404")).unwrap_err();
        assert!(err.to_string().contains("TC-404"));

        let file = write_json("42");
        assert!(read_test_cases(file.path()).is_err());
    }
}
