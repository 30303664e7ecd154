//! Core data models that flow through the synthesis pipeline.
//!
//! Documents and chunks are produced on the ingest side, retrieved
//! passages are produced per query by a [`Retriever`](crate::retriever::Retriever),
//! and [`TestCase`] records are the output of test-case synthesis and the
//! input of script synthesis. All of them are plain serde records; the
//! `TestCase` key set is also the wire contract with model backends.

use serde::{Deserialize, Deserializer, Serialize};

/// A processed support document with its chunked text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub content_type: String,
    pub text_content: String,
    pub chunks: Vec<Chunk>,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
    pub chunk_count: usize,
}

/// A bounded text segment of a document, the unit indexed and retrieved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Random UUID, unique per chunking run.
    pub id: String,
    /// Trimmed window text.
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub metadata: ChunkMetadata,
}

/// Positional metadata for a [`Chunk`].
///
/// Offsets are character offsets into the document text, `start_char < end_char`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_index: i64,
    pub start_char: usize,
    pub end_char: usize,
}

/// A chunk returned for a query, with its distance (lower is closer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    pub metadata: PassageMetadata,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageMetadata {
    pub source: String,
    pub chunk_index: i64,
}

/// Kind of a generated test case.
///
/// Deserialization is case-insensitive; a value outside the catalogue
/// becomes [`TestType::Exploratory`] and `null` becomes the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    #[default]
    Positive,
    Negative,
    Exploratory,
    Informational,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Positive => "positive",
            TestType::Negative => "negative",
            TestType::Exploratory => "exploratory",
            TestType::Informational => "informational",
        }
    }

    fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "" | "positive" => TestType::Positive,
            "negative" => TestType::Negative,
            "informational" => TestType::Informational,
            _ => TestType::Exploratory,
        }
    }
}

impl<'de> Deserialize<'de> for TestType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(|label| TestType::from_label(&label))
            .unwrap_or_default())
    }
}

/// A structured test-case record.
///
/// Field names are the exact keys model backends are asked to emit:
/// `test_id, feature, test_scenario, expected_result, grounded_in, test_type, steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    pub feature: String,
    pub test_scenario: String,
    pub expected_result: String,
    /// Comma-joined source document names.
    #[serde(default, deserialize_with = "string_or_list")]
    pub grounded_in: String,
    #[serde(default)]
    pub test_type: TestType,
    /// One string is split into one step per non-empty line.
    #[serde(default, deserialize_with = "steps_from_string_or_list")]
    pub steps: Vec<String>,
}

/// Accept `grounded_in` either as a string or as a list of names.
fn string_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Grounding {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match Grounding::deserialize(deserializer)? {
        Grounding::One(s) => s,
        Grounding::Many(list) => list.join(", "),
        Grounding::Nothing(()) => String::new(),
    })
}

fn steps_from_string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Steps {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match Steps::deserialize(deserializer)? {
        Steps::One(s) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Steps::Many(list) => list,
        Steps::Nothing(()) => Vec::new(),
    })
}
