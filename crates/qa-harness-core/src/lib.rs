//! # QA Harness Core
//!
//! Runtime-free logic for grounded test generation: data models, chunking,
//! the retrieval abstraction, context building, feature detection,
//! test-case synthesis with model fallback, selector extraction, and
//! Selenium script rendering.
//!
//! This crate has no tokio, sqlx, filesystem or network dependencies.
//! Retrieval and language-model access come in through the [`Retriever`],
//! [`Embedder`] and [`Generator`] traits; the `qa-harness` application
//! crate provides the real implementations.
//!
//! ```text
//! document ─► chunk ─► Retriever::index
//! query ─► Retriever::query ─► context ─► Generator | features + templates ─► TestCase[]
//! TestCase + markup ─► selectors ─► script
//! ```
//!
//! [`Retriever`]: retriever::Retriever
//! [`Embedder`]: embedding::Embedder
//! [`Generator`]: testgen::Generator

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod features;
pub mod markup;
pub mod models;
pub mod retriever;
pub mod script;
pub mod selectors;
pub mod templates;
pub mod testgen;
