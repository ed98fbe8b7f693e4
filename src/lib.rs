//! # PV Harness
//!
//! Retrieval-grounded question answering over a folder of photovoltaic
//! energy documents.
//!
//! The engine itself (chunking, indexing, retrieval, prompt composition)
//! lives in [`pv_harness_core`]. This crate supplies everything around it:
//! configuration, PDF extraction, the document folder scan, persisted
//! document stores and index snapshots, embedding and language-model
//! providers, and the CLI and HTTP shells.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ documents/  │──▶│   Extract    │──▶│  DocumentStore   │
//! │  *.pdf      │   │ (pdf-extract)│   │ JSON / SQLite    │
//! └─────────────┘   └──────────────┘   └────────┬─────────┘
//!                                               │
//!                                   ┌───────────▼──────────┐
//!                                   │ Index (TF-IDF/vector)│
//!                                   └───────────┬──────────┘
//!                      ┌────────────────────────┤
//!                      ▼                        ▼
//!                 ┌──────────┐            ┌──────────┐
//!                 │   CLI    │            │   HTTP   │
//!                 │  (pvh)   │            │  (axum)  │
//!                 └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pvh ingest                      # index ./documents/**/*.pdf
//! pvh ask "¿Qué es un inversor?"  # answer from the documents
//! pvh serve                       # question form on http://127.0.0.1:7340
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`extract`] | PDF / plain-text extraction |
//! | [`connector_fs`] | Documents folder scan |
//! | [`store_json`] | Flat JSON document store |
//! | [`store_sqlite`] | SQLite document store |
//! | [`db`] | SQLite connection and schema |
//! | [`snapshot`] | Vector index snapshot files |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Language-model providers |
//! | [`app`] | Engine assembly from config |
//! | [`ingest`] | Ingestion pipeline |
//! | [`ask`], [`search`], [`docs`] | CLI commands |
//! | [`server`] | HTTP server |

pub mod app;
pub mod ask;
pub mod config;
pub mod connector_fs;
pub mod db;
pub mod docs;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod search;
pub mod server;
pub mod snapshot;
pub mod store_json;
pub mod store_sqlite;
