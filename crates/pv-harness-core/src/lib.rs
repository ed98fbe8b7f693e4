//! # PV Harness Core
//!
//! The retrieval engine behind PV Harness: document store abstraction,
//! chunking, lexical (TF-IDF) and vector indexes, ranked retrieval under a
//! character budget, and prompt composition for a hosted language model.
//!
//! This crate does no filesystem, database, or network I/O. Collaborators
//! (persistence backends, embedding providers, language models) plug in
//! through the traits in [`store`], [`embedding`], [`index`] and [`model`].
//!
//! ```text
//!  text ─▶ Chunker ─▶ DocumentStore ─▶ FragmentIndex ─▶ Retriever ─▶ ContextComposer ─▶ LanguageModel
//! ```

pub mod chunk;
pub mod compose;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod text;

pub use engine::{Answer, AnswerStatus, DocumentSummary, Engine};
pub use error::{Error, ProviderError};
pub use model::{DisabledModel, LanguageModel};
