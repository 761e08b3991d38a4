use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use cex_ai::{EvaluationPrompt, EvaluatorProvider, EvaluatorResponse, ProviderError};
use cex_server::{CexServer, HttpRequest, HttpResponse};
use serde_json::{Map, Value, json};

fn temp_db(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!(
        "cex-route-{tag}-{}-{nanos}.json",
        std::process::id()
    ))
}

fn server(tag: &str) -> CexServer {
    CexServer::with_db_path(temp_db(tag)).expect("server")
}

fn metrics(values: [f64; 12]) -> Map<String, Value> {
    let keys = [
        "Sp", "Ac", "Da", "Zl", "To", "Ng", "Rt", "Pm", "Va", "Id", "Sc", "Lu",
    ];
    keys.iter()
        .zip(values)
        .map(|(k, v)| ((*k).to_string(), json!(v)))
        .collect()
}

fn payload(iata: &str, airport: &str, values: [f64; 12]) -> Value {
    let mut map = metrics(values);
    map.insert("iata".to_string(), json!(iata));
    map.insert("airport".to_string(), json!(airport));
    Value::Object(map)
}

fn uniform(iata: &str, airport: &str, v: f64) -> Value {
    payload(iata, airport, [v; 12])
}

fn body(resp: &HttpResponse) -> Value {
    resp.body_json().expect("json body")
}

fn get(server: &CexServer, target: &str) -> (u16, Value) {
    let resp = server.handle(HttpRequest::get(target));
    (resp.status, body(&resp))
}

fn post(server: &CexServer, target: &str, value: &Value) -> (u16, Value) {
    let resp = server.handle(HttpRequest::post_json(target, value));
    (resp.status, body(&resp))
}

fn iatas(rows: &Value) -> Vec<String> {
    rows.as_array()
        .expect("array")
        .iter()
        .map(|r| r["iata"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn root_and_health_report_liveness() {
    let server = server("live");
    assert_eq!(get(&server, "/"), (200, json!({"online": true})));
    assert_eq!(get(&server, "/health"), (200, json!({"status": "ok"})));
}

#[test]
fn calculate_returns_scores_without_persisting() {
    let server = server("calc");
    let gru = payload(
        "GRU",
        "São Paulo/Guarulhos",
        [8.0, 7.0, 9.0, 6.0, 8.0, 7.0, 9.0, 6.0, 8.0, 7.0, 9.0, 6.0],
    );
    let (status, out) = post(&server, "/calculate_cex", &gru);
    assert_eq!(status, 200);
    assert_eq!(out["iata"], "GRU");
    assert_eq!(out["airport"], "São Paulo/Guarulhos");
    for key in ["C", "E", "X", "CEX"] {
        assert_eq!(out[key], json!(7.5), "{key}");
    }

    let (_, rows) = get(&server, "/api/airports");
    assert_eq!(rows, json!([]));
}

#[test]
fn submit_persists_unrounded_and_returns_rounded() {
    let server = server("submit");
    let input = payload(
        "JFK",
        "New York JFK",
        [8.0, 7.0, 7.0, 7.0, 6.0, 6.0, 6.0, 7.0, 9.0, 9.0, 9.0, 8.0],
    );
    let (status, out) = post(&server, "/api/cex", &input);
    assert_eq!(status, 200);
    assert_eq!(out["C"], json!(7.25));
    assert_eq!(out["E"], json!(6.25));
    assert_eq!(out["X"], json!(8.75));
    assert_eq!(out["CEX"], json!(7.42));

    let (status, row) = get(&server, "/api/airports/JFK");
    assert_eq!(status, 200);
    let stored = row["cex"].as_f64().expect("cex");
    assert!((stored - 22.25 / 3.0).abs() < 1e-12);
    assert_eq!(row["comfort"], json!(7.25));
    assert_eq!(row["id"], "eval-1");

    let (status, _) = post(&server, "/cex", &uniform("LHR", "London Heathrow", 6.0));
    assert_eq!(status, 200);
    let (_, rows) = get(&server, "/api/airports");
    assert_eq!(iatas(&rows), vec!["JFK", "LHR"]);
}

#[test]
fn invalid_payloads_are_rejected_with_messages() {
    let server = server("invalid");

    let mut missing = uniform("GRU", "Guarulhos", 7.0);
    if let Some(map) = missing.as_object_mut() {
        map.remove("Zl");
    }
    assert_eq!(
        post(&server, "/api/cex", &missing),
        (400, json!({"error": "Missing field: Zl"}))
    );

    let mut bad = uniform("GRU", "Guarulhos", 7.0);
    bad["Zl"] = json!("not-a-number");
    let (status, out) = post(&server, "/calculate_cex", &bad);
    assert_eq!(status, 400);
    assert!(out["error"].as_str().unwrap_or_default().contains("must be a number"));

    let resp = server.handle(HttpRequest::new("POST", "/api/cex", "not json"));
    assert_eq!(resp.status, 400);
    assert_eq!(body(&resp)["error"], "JSON payload missing or invalid.");

    let (status, _) = post(&server, "/api/cex", &json!([1, 2, 3]));
    assert_eq!(status, 400);

    let (_, rows) = get(&server, "/api/airports");
    assert_eq!(rows, json!([]));
}

#[test]
fn blank_airport_code_is_a_client_error() {
    let server = server("blank-iata");
    let (status, out) = post(&server, "/api/cex", &uniform("", "Nameless Field", 7.0));
    assert_eq!(status, 400);
    assert_eq!(out["error"], "invalid input: iata cannot be empty");
    assert_eq!(get(&server, "/api/airports").1, json!([]));

    let (status, out) = post(&server, "/calculate_cex", &uniform("", "Nameless Field", 7.0));
    assert_eq!(status, 200);
    assert_eq!(out["CEX"], json!(7.0));
}

#[test]
fn extreme_finite_metrics_produce_finite_scores() {
    let server = server("extreme");
    let huge = uniform("BIG", "Huge Scores", 1e308);
    let (status, out) = post(&server, "/calculate_cex", &huge);
    assert_eq!(status, 200);
    for key in ["C", "E", "X", "CEX"] {
        let v = out[key].as_f64().unwrap_or(f64::NAN);
        assert!(v.is_finite(), "{key} = {}", out[key]);
    }

    let (status, _) = post(&server, "/api/cex", &huge);
    assert_eq!(status, 200);
    let (status, row) = get(&server, "/api/airports/BIG");
    assert_eq!(status, 200);
    assert!(row["cex"].as_f64().is_some_and(f64::is_finite));
}

fn seeded(tag: &str) -> CexServer {
    let server = server(tag);
    for (iata, airport, v) in [
        ("GRU", "São Paulo/Guarulhos", 7.5),
        ("CGH", "São Paulo/Congonhas", 0.2),
        ("LHR", "London Heathrow", 9.0),
        ("GIG", "Rio de Janeiro/Galeão", 0.5),
    ] {
        let (status, _) = post(&server, "/api/cex", &uniform(iata, airport, v));
        assert_eq!(status, 200);
    }
    server
}

#[test]
fn listings_order_by_cex() {
    let server = seeded("order");
    let (_, desc) = get(&server, "/api/airports/desc");
    assert_eq!(iatas(&desc), vec!["LHR", "GRU", "GIG", "CGH"]);
    let (_, asc) = get(&server, "/api/airports/asc/");
    assert_eq!(iatas(&asc), vec!["CGH", "GIG", "GRU", "LHR"]);
}

#[test]
fn thresholds_split_inclusive_above_exclusive_below() {
    let server = seeded("threshold");
    let (_, above) = get(&server, "/api/airports/cex_above");
    assert_eq!(iatas(&above), vec!["LHR", "GRU", "GIG"]);
    let (_, below) = get(&server, "/api/airports/cex_below");
    assert_eq!(iatas(&below), vec!["CGH"]);

    let (_, above) = get(&server, "/api/airports/cex_above?threshold=8");
    assert_eq!(iatas(&above), vec!["LHR"]);
    let (_, below) = get(&server, "/api/airports/cex_below?threshold=8");
    assert_eq!(iatas(&below), vec!["CGH", "GIG", "GRU"]);
}

#[test]
fn search_matches_airport_name_case_insensitively() {
    let server = seeded("search");
    let (_, hits) = get(&server, "/api/search?q=s%C3%A3o+paulo");
    assert_eq!(iatas(&hits), vec!["GRU", "CGH"]);
    let (_, hits) = get(&server, "/api/airports/search/?q=HEATHROW");
    assert_eq!(iatas(&hits), vec!["LHR"]);
    assert_eq!(get(&server, "/api/search?q=%20%20"), (200, json!([])));
    assert_eq!(get(&server, "/api/search"), (200, json!([])));
}

#[test]
fn airport_lookup_returns_latest_row_or_404() {
    let server = seeded("lookup");
    let (status, _) = post(&server, "/api/cex", &uniform("GRU", "São Paulo/Guarulhos", 8.0));
    assert_eq!(status, 200);

    let (status, row) = get(&server, "/api/airports/gru");
    assert_eq!(status, 200);
    assert_eq!(row["cex"], json!(8.0));
    assert_eq!(row["id"], "eval-5");

    let (status, row) = get(&server, "/api/airport/LHR");
    assert_eq!(status, 200);
    assert_eq!(row["airport"], "London Heathrow");

    assert_eq!(
        get(&server, "/api/airports/ZZZ"),
        (404, json!({"error": "Airport not found"}))
    );
}

#[test]
fn recent_and_stats_summarize_store() {
    let server = seeded("recent");
    let (_, recent) = get(&server, "/api/recent?limit=2");
    assert_eq!(iatas(&recent), vec!["GIG", "LHR"]);

    let (status, stats) = get(&server, "/api/stats");
    assert_eq!(status, 200);
    assert_eq!(stats["count"], 4);
    assert_eq!(stats["airports"], 4);
}

#[test]
fn unknown_routes_and_wrong_methods() {
    let server = server("routes");
    assert_eq!(get(&server, "/nope"), (404, json!({"error": "not found"})));
    assert_eq!(get(&server, "/api/airports/GRU/extra").0, 404);
    assert_eq!(get(&server, "/api/cex").0, 405);
    assert_eq!(post(&server, "/api/airports", &json!({})).0, 405);
    let preflight = server.handle(HttpRequest::new("OPTIONS", "/api/cex", Vec::new()));
    assert_eq!(preflight.status, 204);
}

struct FixedEvaluator {
    metrics: Map<String, Value>,
}

#[async_trait]
impl EvaluatorProvider for FixedEvaluator {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn evaluate(
        &self,
        prompt: EvaluationPrompt,
    ) -> Result<EvaluatorResponse, ProviderError> {
        if prompt.iata == "ERR" {
            return Err(ProviderError::Api {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(EvaluatorResponse {
            provider: "fixed".to_string(),
            model: "fixed-1".to_string(),
            metrics: self.metrics.clone(),
        })
    }
}

fn with_fixed(tag: &str, metrics: Map<String, Value>) -> CexServer {
    server(tag).with_evaluator(Arc::new(FixedEvaluator { metrics }))
}

#[test]
fn evaluate_scores_and_stores_provider_metrics() {
    let server = with_fixed(
        "evaluate",
        metrics([8.0, 7.0, 9.0, 6.0, 8.0, 7.0, 9.0, 6.0, 8.0, 7.0, 9.0, 6.0]),
    );
    let (status, out) = post(
        &server,
        "/api/evaluate",
        &json!({"iata": "GRU", "airport": "São Paulo/Guarulhos"}),
    );
    assert_eq!(status, 200);
    assert_eq!(out["calculation"]["CEX"], json!(7.5));
    assert_eq!(out["calculation"]["iata"], "GRU");
    assert_eq!(out["saved"]["id"], "eval-1");
    assert_eq!(out["metrics"]["Da"], json!(9.0));
    assert_eq!(out["provider"], "fixed");

    let (status, row) = get(&server, "/api/airports/GRU");
    assert_eq!(status, 200);
    assert_eq!(row["airport"], "São Paulo/Guarulhos");
}

#[test]
fn evaluate_maps_provider_failures() {
    let server = with_fixed("evaluate-err", metrics([7.0; 12]));
    let (status, out) = post(
        &server,
        "/api/evaluate",
        &json!({"iata": "ERR", "airport": "Broken"}),
    );
    assert_eq!(status, 502);
    assert!(out["error"].as_str().unwrap_or_default().starts_with("AI evaluation failed"));

    let (status, out) = post(&server, "/api/evaluate", &json!({"airport": "No Code"}));
    assert_eq!(status, 400);
    assert_eq!(out["error"], "Missing field: iata");

    let (status, _) = post(
        &server,
        "/api/evaluate",
        &json!({"iata": "GRU", "airport": "Guarulhos", "provider": "openai"}),
    );
    assert_eq!(status, 400);

    let (status, _) = post(
        &server,
        "/api/evaluate",
        &json!({"iata": "GRU", "airport": "Guarulhos", "provider": "llama", "api_key": "k"}),
    );
    assert_eq!(status, 400);
}

#[test]
fn evaluate_rejects_incomplete_model_output() {
    let mut partial = metrics([7.0; 12]);
    partial.remove("Lu");
    let server = with_fixed("evaluate-partial", partial);
    let (status, out) = post(
        &server,
        "/api/evaluate",
        &json!({"iata": "GRU", "airport": "Guarulhos"}),
    );
    assert_eq!(status, 502);
    assert_eq!(out["error"], "CEX calculation error: Missing field: Lu");
    assert_eq!(get(&server, "/api/airports").1, json!([]));
}

#[test]
fn evaluate_without_provider_is_a_client_error() {
    let server = server("no-ai");
    let (status, out) = post(
        &server,
        "/api/evaluate",
        &json!({"iata": "GRU", "airport": "Guarulhos"}),
    );
    assert_eq!(status, 400);
    assert!(out["error"].as_str().unwrap_or_default().contains("not configured"));
}
