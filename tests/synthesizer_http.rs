//! HTTP synthesizer against a mock Ollama-compatible server, alone and
//! wired into a full search.

use std::sync::Arc;
use std::time::Duration;

use muwasala::{AppConfig, HttpSynthesizer, KeywordClassifier};
use muwasala_search::{Aggregator, ResponseOrigin, SearchRequest, TextSynthesizer};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn posts_prompt_and_reads_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "llama3.1", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1",
            "response": "Zakat is due on gold above the nisab [1].",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let synth = HttpSynthesizer::new(server.uri(), Duration::from_secs(5));
    let text = synth.generate("Question: zakat on gold", "llama3.1").await.expect("generate");
    assert_eq!(text, "Zakat is due on gold above the nisab [1].");
}

#[tokio::test]
async fn server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not found"))
        .mount(&server)
        .await;

    let synth = HttpSynthesizer::new(server.uri(), Duration::from_secs(5));
    let err = synth.generate("p", "missing").await.unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn malformed_body_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&server)
        .await;

    let synth = HttpSynthesizer::new(server.uri(), Duration::from_secs(5));
    let err = synth.generate("p", "llama3.1").await.unwrap_err();
    assert!(err.to_string().contains("malformed"));
}

#[tokio::test]
async fn failing_synthesizer_degrades_search_to_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = AppConfig::default();
    config.search.sources.clear();
    config.search.routing.clear();

    let aggregator = Aggregator::builder(config.search.clone())
        .classifier(Arc::new(KeywordClassifier::new(&config.classifier)))
        .synthesizer(Arc::new(HttpSynthesizer::new(server.uri(), Duration::from_secs(5))))
        .build()
        .expect("build");

    let response = aggregator
        .search(SearchRequest::new("rules of fasting in ramadan", "en", 10), &CancellationToken::new())
        .await
        .expect("search");

    assert!(!response.success);
    assert!(response.answer.starts_with("Sorry"));
    assert_eq!(response.origin, ResponseOrigin::StaticCache);
    assert!(response.results.iter().any(|r| r.url == "https://quran.com/2/183"));
}
