//! `qa generate`: synthesize test cases for a natural-language request.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use qa_harness_core::testgen::{Origin, TestCaseSynthesizer};

use crate::config::Config;
use crate::generator::create_generator;
use crate::sqlite_store::SqliteRetriever;

/// Retrieve, synthesize and print the test cases as a JSON array.
///
/// With `output`, the array is written to that file instead of stdout.
pub async fn run_generate(config: &Config, query: &str, output: Option<&Path>) -> Result<()> {
    let retriever = SqliteRetriever::open(config).await?;
    let generator = create_generator(&config.generator)?;

    let mut synthesizer = TestCaseSynthesizer::new(&retriever)
        .top_k(config.retrieval.top_k)
        .context_builder(config.retrieval.context_builder());
    if let Some(generator) = generator.as_deref() {
        if !generator.is_ready() {
            warn!(
                provider = %config.generator.provider,
                "generator not configured with an API key, using rule-based logic"
            );
        }
        synthesizer = synthesizer.with_generator(generator);
    }

    let synthesis = synthesizer.synthesize(query).await?;
    retriever.close().await;

    let origin = match synthesis.origin {
        Origin::NoDocumentation => "no documentation",
        Origin::Model => "model",
        Origin::RuleBased => "rules",
        Origin::Exploratory => "rules (exploratory)",
    };
    info!(
        origin,
        count = synthesis.test_cases.len(),
        "test cases ready"
    );

    let json = serde_json::to_string_pretty(&synthesis.test_cases)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Wrote {} test case(s) to {}",
                synthesis.test_cases.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
