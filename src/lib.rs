//! # QA Harness
//!
//! Retrieval-grounded generation of QA test cases and Selenium scripts from
//! support documentation.
//!
//! The synthesis pipeline itself lives in the runtime-free
//! `qa_harness_core` crate. This crate supplies the pieces that touch the
//! outside world: configuration, SQLite storage, embedding and language-model
//! backends, document extraction, and the `qa` CLI commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Documents  │──▶│ Extract +   │──▶│   SQLite     │
//! │ md/json/pdf │   │ Chunk+Embed │   │ chunks+blobs │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ query
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                 ┌─────────────┐     ┌─────────────┐
//!                 │ Test cases  │────▶│  Selenium   │
//!                 │ model/rules │     │   scripts   │
//!                 └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qa init                                   # create database
//! qa index ./docs                           # build the knowledge base
//! qa generate "discount code" -o cases.json # test cases as JSON
//! qa script --test-cases cases.json --markup checkout.html
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite-backed retriever |
//! | [`embedding`] | Embedding providers |
//! | [`generator`] | Language-model backends |
//! | [`extract`] | Document text extraction and processing |
//! | [`ingest`] | `qa process` / `qa index` |
//! | [`generate`] | `qa generate` |
//! | [`script_cmd`] | `qa script` |
//! | [`sources`] | `qa sources` / `qa clear` |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod generator;
pub mod ingest;
pub mod migrate;
pub mod script_cmd;
pub mod sources;
pub mod sqlite_store;
