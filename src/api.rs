//! HTTP API for survival prediction
//!
//! Health checks plus a single prediction endpoint that fans a passenger out to
//! every loaded gate.

use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceEngine;
use serde::Serialize;
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Error body, `{"detail": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

// =============================================================================
// API Routes
// =============================================================================

/// Build the complete route tree, CORS and rejection handling included
pub fn routes(
    engine: Arc<InferenceEngine>,
    metrics: Arc<ServiceMetrics>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&StatusResponse { status: "ok" }));

    let healthchecker = warp::path!("api" / "healthchecker")
        .and(warp::get())
        .map(|| warp::reply::json(&StatusResponse { status: "success" }));

    let predict = warp::path!("api" / "predict")
        .and(warp::post())
        .and(warp::body::json::<Map<String, Value>>())
        .and(with_engine(engine))
        .and(with_metrics(metrics))
        .and_then(handle_predict);

    // Open to any browser origin
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"])
        .allow_headers(vec![
            "accept",
            "accept-language",
            "authorization",
            "content-language",
            "content-type",
            "origin",
            "user-agent",
            "x-requested-with",
        ]);

    health
        .or(healthchecker)
        .or(predict)
        .with(cors)
        .recover(handle_rejection)
}

// =============================================================================
// Filters
// =============================================================================

fn with_engine(
    engine: Arc<InferenceEngine>,
) -> impl Filter<Extract = (Arc<InferenceEngine>,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

fn with_metrics(
    metrics: Arc<ServiceMetrics>,
) -> impl Filter<Extract = (Arc<ServiceMetrics>,), Error = Infallible> + Clone {
    warp::any().map(move || metrics.clone())
}

// =============================================================================
// Handlers
// =============================================================================

async fn handle_predict(
    payload: Map<String, Value>,
    engine: Arc<InferenceEngine>,
    metrics: Arc<ServiceMetrics>,
) -> Result<warp::reply::Response, Infallible> {
    let start = Instant::now();

    match engine.predict_payload(&payload) {
        Ok(response) => {
            let elapsed = start.elapsed();
            metrics.record_request(elapsed);
            debug!(
                gates = response.results.len(),
                processing_time_us = elapsed.as_micros() as u64,
                "Prediction served"
            );
            Ok(warp::reply::with_status(warp::reply::json(&response), StatusCode::OK)
                .into_response())
        }
        Err(e) => {
            metrics.record_failure();
            let detail = format!("{:#}", e);
            error!(error = %detail, "Prediction failed");
            Ok(detail_response(StatusCode::INTERNAL_SERVER_ERROR, detail))
        }
    }
}

/// Map warp rejections onto `{"detail": ...}` bodies
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, detail): (StatusCode, String) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".into())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Request body must be a JSON object: {}", e),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported Media Type".into(),
        )
    } else if let Some(e) = err.find::<warp::filters::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".into())
    } else {
        error!(rejection = ?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".into(),
        )
    };

    Ok(detail_response(status, detail))
}

// =============================================================================
// Helpers
// =============================================================================

fn detail_response(status: StatusCode, detail: String) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(&ErrorDetail { detail }), status).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::gate::{Gate, GateScore};
    use crate::models::registry::ModelRegistry;
    use crate::types::prediction::PredictionResponse;
    use anyhow::{bail, Result};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    /// Survives iff first class or female, otherwise a fixed probability
    struct ClassGate;

    impl Gate for ClassGate {
        fn name(&self) -> &str {
            "Logistic Gate"
        }

        fn score(&self, features: &[f32]) -> Result<GateScore> {
            let (pclass, sex_male) = (features[0], features[5]);
            if pclass == 1.0 || sex_male == 0.0 {
                Ok(GateScore::Probability(0.9123))
            } else {
                Ok(GateScore::Probability(0.1049))
            }
        }
    }

    /// Margin-only gate: margin is the age offset from 30
    struct MarginGate;

    impl Gate for MarginGate {
        fn name(&self) -> &str {
            "SVM Gate"
        }

        fn score(&self, features: &[f32]) -> Result<GateScore> {
            Ok(GateScore::Margin((30.0 - features[1] as f64) / 10.0))
        }
    }

    struct FailingGate;

    impl Gate for FailingGate {
        fn name(&self) -> &str {
            "XGBoost Gate"
        }

        fn score(&self, _features: &[f32]) -> Result<GateScore> {
            bail!("feature_names mismatch")
        }
    }

    fn setup(gates: Vec<Box<dyn Gate>>) -> (Arc<InferenceEngine>, Arc<ServiceMetrics>) {
        let metrics = Arc::new(ServiceMetrics::new());
        let engine = Arc::new(
            InferenceEngine::new(ModelRegistry::from_gates(gates)).with_metrics(metrics.clone()),
        );
        (engine, metrics)
    }

    fn two_gates() -> Vec<Box<dyn Gate>> {
        vec![Box::new(ClassGate), Box::new(MarginGate)]
    }

    #[tokio::test]
    async fn test_health() {
        let (engine, metrics) = setup(Vec::new());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_healthchecker() {
        let (engine, metrics) = setup(two_gates());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("GET")
            .path("/api/healthchecker")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body, json!({"status": "success"}));
    }

    #[tokio::test]
    async fn test_predict_full_payload() {
        let (engine, metrics) = setup(two_gates());
        let routes = routes(engine, metrics.clone());

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&json!({"pclass": 1, "age": 20, "fare": 80.0, "sex_male": 0}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: PredictionResponse = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.results.len(), 2);

        assert_eq!(body.results[0].name, "Logistic Gate");
        assert_eq!(body.results[0].prob, 91.2);
        assert!(body.results[0].survived);

        // sigmoid(1.0) = 0.7310...
        assert_eq!(body.results[1].name, "SVM Gate");
        assert_eq!(body.results[1].prob, 73.1);
        assert!(body.results[1].survived);

        for result in &body.results {
            assert!((0.0..=100.0).contains(&result.prob));
            assert_eq!(result.survived, result.prob > 50.0);
        }

        assert_eq!(metrics.requests_served.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_predict_defaults() {
        let (engine, metrics) = setup(two_gates());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&json!({}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: PredictionResponse = serde_json::from_slice(resp.body()).unwrap();

        // Defaults: third class male, age 25
        assert_eq!(body.results[0].prob, 10.5);
        assert!(!body.results[0].survived);
        // sigmoid(0.5) = 0.6224...
        assert_eq!(body.results[1].prob, 62.2);
    }

    #[tokio::test]
    async fn test_predict_margin_tie_not_survived() {
        let (engine, metrics) = setup(vec![Box::new(MarginGate)]);
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&json!({"age": 30}))
            .reply(&routes)
            .await;

        let body: PredictionResponse = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.results[0].prob, 50.0);
        assert!(!body.results[0].survived);
    }

    #[tokio::test]
    async fn test_predict_no_gates() {
        let (engine, metrics) = setup(Vec::new());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&json!({"pclass": 2, "age": 31.5}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body, json!({"results": []}));
    }

    #[tokio::test]
    async fn test_predict_string_age_from_form() {
        let (engine, metrics) = setup(vec![Box::new(MarginGate)]);
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&json!({"age": "40"}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: PredictionResponse = serde_json::from_slice(resp.body()).unwrap();
        // sigmoid(-1.0) = 0.2689...
        assert_eq!(body.results[0].prob, 26.9);
    }

    #[tokio::test]
    async fn test_predict_non_numeric_fare() {
        let (engine, metrics) = setup(two_gates());
        let routes = routes(engine, metrics.clone());

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&json!({"fare": "first class"}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("first class"));
        assert_eq!(metrics.requests_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_predict_non_numeric_age_even_without_gates() {
        let (engine, metrics) = setup(Vec::new());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&json!({"age": "unknown"}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body["detail"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_predict_gate_failure_is_not_partial() {
        let (engine, metrics) = setup(vec![Box::new(ClassGate), Box::new(FailingGate)]);
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&json!({}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert!(body.get("results").is_none());
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("feature_names mismatch"));
    }

    #[tokio::test]
    async fn test_predict_rejects_non_object_body() {
        let (engine, metrics) = setup(two_gates());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .header("content-type", "application/json")
            .body("[1, 2, 3]")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_predict_is_idempotent() {
        let (engine, metrics) = setup(two_gates());
        let routes = routes(engine, metrics);
        let payload = json!({"pclass": 2, "age": 33, "fare": 13.0, "sex_male": 1});

        let first = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&payload)
            .reply(&routes)
            .await;
        let second = warp::test::request()
            .method("POST")
            .path("/api/predict")
            .json(&payload)
            .reply(&routes)
            .await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.body(), second.body());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (engine, metrics) = setup(Vec::new());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("POST")
            .path("/predict")
            .json(&json!({}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let (engine, metrics) = setup(Vec::new());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("OPTIONS")
            .path("/api/predict")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_cors_rejects_unlisted_request_header() {
        let (engine, metrics) = setup(Vec::new());
        let routes = routes(engine, metrics);

        let resp = warp::test::request()
            .method("OPTIONS")
            .path("/api/predict")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "x-client-id")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert!(body["detail"].is_string());
    }
}
