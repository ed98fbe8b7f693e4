//! Retrieval without a language model.
//!
//! `pvh search` shows exactly the fragments `pvh ask` would put in the
//! prompt, ranked best first. Used to tune `[retrieval]` and `[chunking]`
//! against a real document set.

use anyhow::Result;
use pv_harness_core::models::ScoredFragment;

use crate::app::open_engine;
use crate::config::Config;

/// Retrieve fragments for `query`, optionally overriding the configured
/// `top_k` and character budget.
pub async fn search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    max_chars: Option<usize>,
) -> Result<Vec<ScoredFragment>> {
    let engine = open_engine(config).await?;
    let mut retriever = *engine.retriever();
    if let Some(k) = top_k {
        retriever.top_k = k.max(1);
    }
    if let Some(chars) = max_chars {
        retriever.max_total_chars = chars;
    }
    let engine = engine.with_retriever(retriever);
    Ok(engine.retrieve(query).await?)
}

pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    max_chars: Option<usize>,
) -> Result<()> {
    let results = search(config, query, top_k, max_chars).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} #{}",
            i + 1,
            result.score,
            result.document,
            result.ordinal
        );
        println!(
            "    excerpt: \"{}\"",
            result.text.replace('\n', " ").trim()
        );
        println!();
    }
    Ok(())
}
