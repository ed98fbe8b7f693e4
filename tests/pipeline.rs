//! Library-level pipeline scenarios: persistence across restarts, recovery
//! from corrupted state, and vector snapshots.

use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

use pv_harness::app::open_engine;
use pv_harness::config::Config;
use pv_harness::connector_fs::SourceFile;
use pv_harness::ingest::ingest_files;
use pv_harness_core::{AnswerStatus, LanguageModel, ProviderError};

const PANELES: &str =
    "Los paneles solares convierten la luz del sol en electricidad mediante el efecto fotovoltaico.";
const INVERSOR: &str =
    "El inversor transforma la corriente continua de los paneles en corriente alterna para la red.";

/// Answers with a fixed reply and keeps the last prompt it was given.
struct FixedModel {
    reply: String,
    last_prompt: Mutex<Option<String>>,
}

impl FixedModel {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last_prompt: Mutex::new(None),
        }
    }
}

#[async_trait]
impl LanguageModel for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, ProviderError> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.reply.clone())
    }
}

fn config(root: &Path, backend: &str, strategy: &str) -> Config {
    let mut cfg = Config::minimal();
    cfg.store.backend = backend.to_string();
    cfg.store.path = Some(root.join(if backend == "sqlite" {
        "pvh.sqlite"
    } else {
        "documents.json"
    }));
    cfg.index.strategy = strategy.to_string();
    cfg.index.snapshot_dir = root.join("index");
    cfg.documents.root = root.join("documents");
    cfg
}

#[tokio::test]
async fn test_answer_with_source_and_prompt() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(tmp.path(), "json", "lexical");
    let engine = open_engine(&cfg).await.unwrap();
    engine.ingest("paneles.pdf", PANELES).await.unwrap();
    engine.ingest("inversor.pdf", INVERSOR).await.unwrap();

    let model = FixedModel::new("Convierten la luz del sol en electricidad.");
    let answer = engine
        .ask("¿Qué hacen los paneles solares?", &model)
        .await
        .unwrap();

    assert_eq!(answer.status, AnswerStatus::Answered);
    assert_eq!(answer.source(), Some("paneles.pdf"));
    assert_eq!(answer.display_text, "Convierten la luz del sol en electricidad.");

    let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Documento: paneles.pdf"));
    assert!(prompt.contains(PANELES));
    assert!(prompt.trim_end().ends_with("Respuesta:"));
}

#[tokio::test]
async fn test_json_store_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(tmp.path(), "json", "lexical");

    {
        let engine = open_engine(&cfg).await.unwrap();
        engine.ingest("paneles.pdf", PANELES).await.unwrap();
        engine.ingest("inversor.pdf", INVERSOR).await.unwrap();
    }

    let raw = fs::read_to_string(tmp.path().join("documents.json")).unwrap();
    let mapping: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(mapping["paneles.pdf"], PANELES);

    let engine = open_engine(&cfg).await.unwrap();
    let ids: Vec<String> = engine
        .documents()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["paneles.pdf", "inversor.pdf"]);

    let found = engine.retrieve("corriente alterna").await.unwrap();
    assert_eq!(found[0].document, "inversor.pdf");
}

#[tokio::test]
async fn test_corrupted_json_store_starts_empty() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(tmp.path(), "json", "lexical");
    fs::write(tmp.path().join("documents.json"), "{ \"a.pdf\": ").unwrap();

    let engine = open_engine(&cfg).await.unwrap();
    assert!(!engine.has_documents());
    assert!(tmp.path().join("documents.json.corrupt").exists());

    let answer = engine
        .ask("paneles", &FixedModel::new("irrelevante"))
        .await
        .unwrap();
    assert_eq!(answer.status, AnswerStatus::NoDocuments);
}

#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(tmp.path(), "sqlite", "lexical");

    {
        let engine = open_engine(&cfg).await.unwrap();
        engine.ingest("paneles.pdf", PANELES).await.unwrap();
        engine.ingest("inversor.pdf", INVERSOR).await.unwrap();
        assert!(engine.remove("inversor.pdf").await.unwrap());
    }

    let engine = open_engine(&cfg).await.unwrap();
    assert_eq!(engine.store().backend(), "sqlite");
    assert_eq!(engine.store().len(), 1);
    let found = engine.retrieve("paneles").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].document, "paneles.pdf");
}

#[tokio::test]
async fn test_vector_snapshot_restored_after_restart() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(tmp.path(), "json", "vector");

    let before = {
        let engine = open_engine(&cfg).await.unwrap();
        engine.ingest("paneles.pdf", PANELES).await.unwrap();
        engine.ingest("inversor.pdf", INVERSOR).await.unwrap();
        engine.retrieve("luz del sol").await.unwrap()
    };
    assert!(tmp.path().join("index/vectors.bin").exists());
    assert!(tmp.path().join("index/vectors.ids.json").exists());

    let engine = open_engine(&cfg).await.unwrap();
    let after = engine.retrieve("luz del sol").await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after[0].document, "paneles.pdf");
}

#[tokio::test]
async fn test_corrupted_snapshot_is_rebuilt() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(tmp.path(), "json", "vector");

    {
        let engine = open_engine(&cfg).await.unwrap();
        engine.ingest("paneles.pdf", PANELES).await.unwrap();
    }
    fs::remove_file(tmp.path().join("index/vectors.ids.json")).unwrap();

    let engine = open_engine(&cfg).await.unwrap();
    let found = engine.retrieve("paneles solares").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].document, "paneles.pdf");
    // The rebuild writes a fresh, complete snapshot.
    assert!(tmp.path().join("index/vectors.ids.json").exists());
}

#[tokio::test]
async fn test_snapshot_of_edited_store_is_discarded() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(tmp.path(), "json", "vector");

    {
        let engine = open_engine(&cfg).await.unwrap();
        engine.ingest("paneles.pdf", PANELES).await.unwrap();
    }
    // Edit the store behind the index's back.
    let edited = serde_json::json!({ "paneles.pdf": INVERSOR });
    fs::write(
        tmp.path().join("documents.json"),
        serde_json::to_string(&edited).unwrap(),
    )
    .unwrap();

    let engine = open_engine(&cfg).await.unwrap();
    let found = engine.retrieve("corriente alterna").await.unwrap();
    assert_eq!(found[0].text, INVERSOR);
}

#[tokio::test]
async fn test_ingest_files_from_folder() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(tmp.path(), "json", "lexical");
    fs::create_dir_all(&cfg.documents.root).unwrap();
    fs::write(cfg.documents.root.join("a.txt"), PANELES).unwrap();
    fs::write(cfg.documents.root.join("b.pdf"), b"garbage").unwrap();

    let files = vec![
        SourceFile::from_path(&cfg.documents.root.join("a.txt")).unwrap(),
        SourceFile::from_path(&cfg.documents.root.join("b.pdf")).unwrap(),
    ];
    let engine = open_engine(&cfg).await.unwrap();
    let summary = ingest_files(&engine, &files).await.unwrap();
    assert_eq!(summary.ingested, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.store().len(), 1);
}
