#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end pipeline: CSV ingest, index build, search, recommendation and
//! history, against mocked Ollama and chat completion servers.

use std::path::PathBuf;

use dealwizard::commands::{build_index, ingest_catalog, show_history};
use dealwizard::config::Config;
use dealwizard::context::AppContext;
use dealwizard::indexer::{LoadedIndex, read_manifest};
use dealwizard::recommend::FAILURE_MESSAGE;
use dealwizard::search::SearchOutcome;
use serde_json::{Value, json};
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const API_KEY_VAR: &str = "DEALWIZARD_PIPELINE_TEST_KEY";
const EMBED_DIM: usize = 64;

/// Answers `/api/embed` with one deterministic vector per input
struct EmbedResponder;

impl Respond for EmbedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("embed body is JSON");
        let inputs = body["input"].as_array().expect("input is an array");

        let embeddings: Vec<Vec<f32>> = inputs
            .iter()
            .map(|input| {
                let text = input.as_str().expect("input is a string").to_lowercase();
                let mut vector = vec![0.0_f32; EMBED_DIM];
                for (i, byte) in text.bytes().enumerate() {
                    vector[(usize::from(byte) + i) % EMBED_DIM] += 1.0;
                }
                vector
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

async fn mock_ollama() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EmbedResponder)
        .mount(&server)
        .await;
    server
}

fn test_config(data_dir: &TempDir, ollama: &MockServer, chat: &MockServer) -> Config {
    let mut config = Config {
        base_dir: data_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.ollama.host = ollama.address().ip().to_string();
    config.ollama.port = ollama.address().port();
    config.ollama.batch_size = 5;
    config.llm.base_url = format!("{}/v1", chat.uri());
    config.llm.api_key_env = API_KEY_VAR.to_string();
    config.search.top_k = 12;
    config.search.default_user = "user123".to_string();
    config
}

fn sample_csv() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/laptops_sample.csv")
}

async fn ingest_and_build(config: &Config) {
    let stored = ingest_catalog(config, &sample_csv())
        .await
        .expect("ingest should succeed");
    assert_eq!(stored, 12);

    let summary = build_index(config).await.expect("build should succeed");
    assert_eq!(summary.manifest.record_count, 12);
    assert_eq!(summary.manifest.dimension, EMBED_DIM);
    assert_eq!(summary.manifest.model, config.ollama.model);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn gaming_query_end_to_end() {
    let data_dir = TempDir::new().expect("should create temp dir");
    let ollama = mock_ollama().await;
    let chat = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer pipeline-secret"))
        .and(body_string_contains("important_attributes"))
        .respond_with(completion(
            "```json\n{\"important_attributes\": {\"price_under\": 1000, \"lightweight\": true, \"use_case\": \"gaming\"}}\n```",
        ))
        .mount(&chat)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("matching laptops"))
        .respond_with(completion("The MSI GS65 Stealth Thin is your best bet."))
        .expect(1)
        .mount(&chat)
        .await;

    let config = test_config(&data_dir, &ollama, &chat);
    ingest_and_build(&config).await;

    // SAFETY: serialized with the other env-mutating tests in this file
    unsafe { std::env::set_var(API_KEY_VAR, "pipeline-secret") };
    let context = AppContext::initialize(config.clone())
        .await
        .expect("context should initialize");

    let outcome = context
        .search()
        .search("gaming laptop under 1000 euros, lightweight")
        .await
        .expect("search should succeed");
    let products: Vec<&str> = outcome.matches().iter().map(|r| r.product.as_str()).collect();
    assert_eq!(products, vec!["GS65 Stealth Thin"]);

    let recommendation = context
        .recommend("user123", "gaming laptop under 1000 euros, lightweight")
        .await
        .expect("recommend should succeed");
    assert_eq!(recommendation.text, "The MSI GS65 Stealth Thin is your best bet.");
    context.shutdown().await;
    // SAFETY: serialized with the other env-mutating tests in this file
    unsafe { std::env::remove_var(API_KEY_VAR) };

    let history = show_history(&config, None).await.expect("history should load");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_id, "user123");
    assert_eq!(
        history[0].recommendation.as_deref(),
        Some("The MSI GS65 Stealth Thin is your best bet.")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn chat_outage_degrades_instead_of_failing() {
    let data_dir = TempDir::new().expect("should create temp dir");
    let ollama = mock_ollama().await;
    let chat = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&chat)
        .await;

    let config = test_config(&data_dir, &ollama, &chat);
    ingest_and_build(&config).await;

    // SAFETY: serialized with the other env-mutating tests in this file
    unsafe { std::env::set_var(API_KEY_VAR, "wrong-secret") };
    let context = AppContext::initialize(config)
        .await
        .expect("context should initialize");

    let report = context
        .search()
        .search_with_k("cheap dell", 4)
        .await
        .expect("search should still succeed");
    assert!(report.intent.is_fallback());
    assert_eq!(report.candidates, 4);
    assert!(matches!(report.outcome, SearchOutcome::Matches(ref m) if m.len() == 4));

    let recommendation = context
        .recommend("user123", "cheap dell")
        .await
        .expect("recommend should still answer");
    assert_eq!(recommendation.text, FAILURE_MESSAGE);
    context.shutdown().await;
    // SAFETY: serialized with the other env-mutating tests in this file
    unsafe { std::env::remove_var(API_KEY_VAR) };
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn rebuild_keeps_count_and_replaces_build() {
    let data_dir = TempDir::new().expect("should create temp dir");
    let ollama = mock_ollama().await;
    let chat = MockServer::start().await;
    let config = test_config(&data_dir, &ollama, &chat);

    ingest_and_build(&config).await;
    let first = read_manifest(&config.artifacts_dir()).expect("manifest should exist");

    let second = build_index(&config).await.expect("rebuild should succeed");
    assert_eq!(second.manifest.record_count, first.record_count);
    assert_ne!(second.manifest.build_id, first.build_id);

    let index = LoadedIndex::load(&config.artifacts_dir(), &config.ollama.model)
        .await
        .expect("rebuilt index should load");
    assert_eq!(index.manifest().build_id, second.manifest.build_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn embedding_outage_keeps_previous_index() {
    let data_dir = TempDir::new().expect("should create temp dir");
    let ollama = mock_ollama().await;
    let chat = MockServer::start().await;
    let config = test_config(&data_dir, &ollama, &chat);

    ingest_and_build(&config).await;
    let before = read_manifest(&config.artifacts_dir()).expect("manifest should exist");

    ollama.reset().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400).set_body_string("model not found"))
        .mount(&ollama)
        .await;

    let err = build_index(&config).await.expect_err("build should fail");
    assert!(format!("{err:#}").contains("400"));

    let after = read_manifest(&config.artifacts_dir()).expect("manifest should survive");
    assert_eq!(after, before);
    assert!(!config.build_lock_path().exists());
}

#[tokio::test]
#[serial]
async fn context_needs_an_index() {
    let data_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: data_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.llm.api_key_env = API_KEY_VAR.to_string();

    // SAFETY: serialized with the other env-mutating tests in this file
    unsafe { std::env::set_var(API_KEY_VAR, "secret") };
    let result = AppContext::initialize(config).await;
    // SAFETY: serialized with the other env-mutating tests in this file
    unsafe { std::env::remove_var(API_KEY_VAR) };

    let err = result.err().expect("initialize should fail");
    assert!(format!("{err:#}").contains("build-index"));
}
