use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tower::ServiceExt;

use super::support::Harness;
use crate::web;

async fn call(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, uri, Some(&body.to_string())).await
}

#[tokio::test]
async fn test_index_and_search_over_http() {
    let harness = Harness::new().await;
    let app = web::router(harness.service.clone());

    let (status, indexed) = post_json(
        &app,
        "/index",
        json!({"text": "fungi under the forest", "title": "Forest", "metadata": {"source": "web"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(indexed["status"], json!("indexed"));

    let (status, results) = post_json(&app, "/search", json!({"query": "fungi"})).await;
    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], indexed["id"]);
    assert_eq!(results[0]["title"], json!("Forest"));
    assert_eq!(results[0]["url"], json!(""));
    assert_eq!(results[0]["metadata"]["source"], json!("web"));

    let (status, stats) = call(&app, Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_documents"], json!(1));
    assert_eq!(stats["embedding_dimension"], json!(3));
}

#[tokio::test]
async fn test_batch_index_over_http() {
    let harness = Harness::new().await;
    let app = web::router(harness.service.clone());

    let (status, body) = post_json(
        &app,
        "/index/batch",
        json!([{"text": "fungi"}, {"text": "ocean", "url": "https://example.com/sea"}]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indexed_count"], json!(2));
    assert_eq!(body["ids"].as_array().unwrap().len(), 2);

    let (status, body) = post_json(&app, "/index/batch", json!([{"text": "fungi"}, {"text": ""}])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("document 1"));
    assert_eq!(harness.service.stats().await.unwrap().total_documents, 2);
}

#[tokio::test]
async fn test_invalid_requests_are_unprocessable() {
    let harness = Harness::new().await;
    let app = web::router(harness.service.clone());

    let cases = [
        ("/index", r#"{"text": ""}"#),
        ("/index", r#"{"url": "https://example.com"}"#),
        ("/index", r#"{"text": "#),
        ("/search", r#"{"query": "fungi", "limit": 500}"#),
        ("/search", r#"{"limit": 5}"#),
        ("/graph", r#"{"limit": 1}"#),
    ];

    for (uri, body) in cases {
        let (status, value) = call(&app, Method::POST, uri, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri} {body}");
        assert!(value["error"].is_string(), "{uri} {body}");
    }
    assert_eq!(harness.embedder.calls(), 0);
}

#[tokio::test]
async fn test_provider_failure_is_service_unavailable() {
    let harness = Harness::new().await;
    let app = web::router(harness.service.clone());
    harness.embedder.fail.store(true, Ordering::SeqCst);

    let (status, body) = post_json(&app, "/index", json!({"text": "fungi"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("embedding"));

    harness.embedder.fail.store(false, Ordering::SeqCst);
    harness.store.fail.store(true, Ordering::SeqCst);
    let (status, _) = call(&app, Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_delete_document_twice() {
    let harness = Harness::new().await;
    let app = web::router(harness.service.clone());

    let (_, indexed) = post_json(&app, "/index", json!({"text": "fungi"})).await;
    let uri = format!("/documents/{}", indexed["id"].as_str().unwrap());

    for _ in 0..2 {
        let (status, body) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("deleted"));
        assert_eq!(body["id"], indexed["id"]);
    }

    let (status, _) = call(&app, Method::DELETE, "/documents/nope", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_graph_over_http() {
    let harness = Harness::new().await;
    let app = web::router(harness.service.clone());

    post_json(
        &app,
        "/index/batch",
        json!([
            {"text": "fungi", "title": "A", "metadata": {"tags": ["bio"]}},
            {"text": "mycelium", "title": ""},
        ]),
    )
    .await;

    let (status, graph) = post_json(&app, "/graph", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["node_count"], json!(2));
    assert_eq!(graph["edge_count"], json!(1));
    assert_eq!(graph["nodes"][0]["category"], json!("bio"));
    assert_eq!(graph["nodes"][1]["title"], json!("Untitled"));
}

#[tokio::test]
async fn test_health_reports_degraded() {
    let harness = Harness::new().await;
    let app = web::router(harness.service.clone());

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));

    harness.store.down.store(true, Ordering::SeqCst);
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("degraded"));
    assert_eq!(body["store_connected"], json!(false));
    assert_eq!(body["embedding_connected"], json!(true));
}
