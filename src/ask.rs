//! `pvh ask`: answer a question from the ingested documents.

use anyhow::Result;
use pv_harness_core::{Answer, AnswerStatus};

use crate::app::open_engine;
use crate::config::Config;
use crate::llm::create_model;

pub async fn ask(config: &Config, question: &str) -> Result<Answer> {
    let engine = open_engine(config).await?;
    let model = create_model(&config.llm)?;
    Ok(engine.ask(question, model.as_ref()).await?)
}

pub async fn run_ask(config: &Config, question: &str, json: bool) -> Result<()> {
    let answer = ask(config, question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("status: {}", answer.status.as_str());
    if answer.status == AnswerStatus::Answered {
        if let Some(source) = answer.source() {
            println!("source: {}", source);
        }
    }
    println!();
    println!("{}", answer.display_text);
    Ok(())
}
