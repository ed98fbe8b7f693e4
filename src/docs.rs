//! Document listing and removal.

use anyhow::{bail, Result};

use crate::app::open_engine;
use crate::config::Config;

/// `pvh docs`: one line per stored document, in store order.
pub async fn run_docs(config: &Config) -> Result<()> {
    let engine = open_engine(config).await?;
    let docs = engine.documents().await?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "  {:<40} {:>9} {:>10}   {}",
        "DOCUMENT", "CHARS", "FRAGMENTS", "INGESTED"
    );
    println!("  {}", "-".repeat(80));
    for doc in &docs {
        println!(
            "  {:<40} {:>9} {:>10}   {}",
            doc.id,
            doc.chars,
            doc.fragments,
            doc.ingested_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!(
        "  {} documents ({}, {})",
        docs.len(),
        engine.store().backend(),
        config.store.resolved_path().display()
    );
    Ok(())
}

/// `pvh forget <identity>`
pub async fn run_forget(config: &Config, identity: &str) -> Result<()> {
    let engine = open_engine(config).await?;
    if !engine.remove(identity).await? {
        bail!("document not found: {}", identity);
    }
    println!("forgot {}", identity);
    Ok(())
}
