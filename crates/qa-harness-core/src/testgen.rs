//! Retrieval-grounded test-case synthesis.
//!
//! # Protocol
//!
//! 1. Retrieve the top `k` passages for the query. None → a single
//!    `informational` case; this is not an error.
//! 2. Build the source-tagged context.
//! 3. If a [`Generator`] is configured and ready, ask it for a JSON array
//!    of test cases. Any call or parse failure is logged and demoted to
//!    step 4.
//! 4. Rule path: detect features, emit each feature's positive then
//!    negative templates numbered `TC-001`, `TC-002`, … in catalogue
//!    order. No feature → one `exploratory` case echoing the query.
//!
//! Retrieval failures propagate. Generator failures never do.

use std::collections::BTreeSet;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;
use crate::features::detect;
use crate::models::{RetrievedPassage, TestCase, TestType};
use crate::retriever::Retriever;

/// Passages retrieved per test-case request.
pub const DEFAULT_TOP_K: usize = 8;

/// Prompt → raw text capability of a language-model backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Whether the backend is configured well enough to be called.
    fn is_ready(&self) -> bool;

    /// Single-shot completion. May fail.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Which path produced a [`Synthesis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Retrieval returned nothing.
    NoDocumentation,
    /// Parsed from the generator's response.
    Model,
    /// Feature templates.
    RuleBased,
    /// Rule path found no feature.
    Exploratory,
}

/// Result of one synthesis request.
#[derive(Debug, Clone, Serialize)]
pub struct Synthesis {
    pub origin: Origin,
    /// Why the model path was abandoned, when it was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_error: Option<String>,
    pub test_cases: Vec<TestCase>,
}

/// Orchestrates retrieval, the optional model path and the rule path.
pub struct TestCaseSynthesizer<'a> {
    retriever: &'a dyn Retriever,
    generator: Option<&'a dyn Generator>,
    top_k: usize,
    context: ContextBuilder,
}

impl<'a> TestCaseSynthesizer<'a> {
    pub fn new(retriever: &'a dyn Retriever) -> Self {
        Self {
            retriever,
            generator: None,
            top_k: DEFAULT_TOP_K,
            context: ContextBuilder::default(),
        }
    }

    pub fn with_generator(mut self, generator: &'a dyn Generator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn context_builder(mut self, builder: ContextBuilder) -> Self {
        self.context = builder;
        self
    }

    pub async fn synthesize(&self, query: &str) -> Result<Synthesis> {
        let passages = self
            .retriever
            .query(query, self.top_k)
            .await
            .context("Error generating test cases")?;

        if passages.is_empty() {
            info!("no documentation retrieved for query");
            return Ok(Synthesis {
                origin: Origin::NoDocumentation,
                model_error: None,
                test_cases: vec![no_documentation_case()],
            });
        }

        let context = self.context.build(&passages);
        debug!(
            passages = passages.len(),
            context_chars = context.len(),
            "built context"
        );

        let mut model_error = None;
        if let Some(generator) = self.generator.filter(|g| g.is_ready()) {
            match generate_with_model(generator, query, &context).await {
                Ok(test_cases) => {
                    info!(count = test_cases.len(), "test cases generated by model");
                    return Ok(Synthesis {
                        origin: Origin::Model,
                        model_error: None,
                        test_cases,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "model generation failed, falling back to rule-based logic");
                    model_error = Some(format!("{:#}", e));
                }
            }
        }

        let (origin, test_cases) = rule_based(query, &context, &passages);
        info!(count = test_cases.len(), origin = ?origin, "test cases generated from rules");
        Ok(Synthesis {
            origin,
            model_error,
            test_cases,
        })
    }
}

async fn generate_with_model(
    generator: &dyn Generator,
    query: &str,
    context: &str,
) -> Result<Vec<TestCase>> {
    let raw = generator.complete(&build_prompt(query, context)).await?;
    let cases = parse_model_response(&raw)?;
    if cases.is_empty() {
        bail!("model returned no test cases");
    }
    Ok(cases)
}

/// Prompt asking for a JSON array of test cases grounded in `context`.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        r#"
You are a senior QA engineer. Use ONLY the documentation provided below to
create detailed UI test cases for the user request.

User request:
"""{query}"""

Documentation context:
"""{context}"""

Respond with pure JSON: an array of test case objects.
Each object must include the keys: test_id, feature, test_scenario,
expected_result, grounded_in, test_type (positive|negative|exploratory), steps.
The steps value must be an ordered list of actionable steps.
Use concise wording and reference the documents you relied on in grounded_in.
"#
    )
}

/// Parse a model response into test cases.
///
/// Strips a surrounding Markdown code fence (with optional language tag)
/// and accepts either an array or a single object.
pub fn parse_model_response(raw: &str) -> Result<Vec<TestCase>> {
    let mut cleaned = raw.trim();
    if cleaned.starts_with("```") {
        cleaned = cleaned.trim_matches('`');
        // Drop the language tag line, e.g. "json".
        if let Some((_, rest)) = cleaned.split_once('\n') {
            cleaned = rest;
        }
    }

    let value: serde_json::Value = serde_json::from_str(cleaned.trim())
        .map_err(|e| anyhow!("model response was not valid JSON: {}", e))?;
    let value = match value {
        serde_json::Value::Object(_) => serde_json::Value::Array(vec![value]),
        other => other,
    };
    serde_json::from_value(value).context("model response did not match the test case shape")
}

/// The rule path on its own, for a context already built from `passages`.
pub fn rule_based(
    query: &str,
    context: &str,
    passages: &[RetrievedPassage],
) -> (Origin, Vec<TestCase>) {
    let features = detect(context, query);
    let mut cases = Vec::new();

    for (feature, record) in &features {
        let grounded_in = record.grounded_in();
        let drafts = feature
            .positive_cases(record)
            .into_iter()
            .chain(feature.negative_cases(record));
        for d in drafts {
            cases.push(TestCase {
                test_id: test_id(cases.len() + 1),
                feature: d.feature.to_string(),
                test_scenario: d.test_scenario,
                expected_result: d.expected_result,
                grounded_in: grounded_in.clone(),
                test_type: d.test_type,
                steps: d.steps,
            });
        }
    }

    if cases.is_empty() {
        (Origin::Exploratory, vec![exploratory_case(query, passages)])
    } else {
        (Origin::RuleBased, cases)
    }
}

fn test_id(n: usize) -> String {
    format!("TC-{:03}", n)
}

fn no_documentation_case() -> TestCase {
    TestCase {
        test_id: test_id(1),
        feature: "General".to_string(),
        test_scenario: "No relevant documentation found".to_string(),
        expected_result: "Please upload relevant documentation first".to_string(),
        grounded_in: "No source".to_string(),
        test_type: TestType::Informational,
        steps: Vec::new(),
    }
}

fn exploratory_case(query: &str, passages: &[RetrievedPassage]) -> TestCase {
    let sources: BTreeSet<&str> = passages
        .iter()
        .map(|p| p.metadata.source.as_str())
        .collect();
    TestCase {
        test_id: test_id(1),
        feature: "General Functionality".to_string(),
        test_scenario: format!("Test functionality related to: {}", query),
        expected_result: "System behaves according to documentation specifications".to_string(),
        grounded_in: sources.into_iter().collect::<Vec<_>>().join(", "),
        test_type: TestType::Exploratory,
        steps: [
            "Review relevant documentation",
            "Identify key functionality to test",
            "Execute test scenarios",
            "Verify expected behavior",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    }
}
