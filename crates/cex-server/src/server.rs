use std::io::{self, BufReader};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cex_ai::{
    EvaluationPrompt, EvaluatorProvider, EvaluatorProviderConfig, ProviderError,
    build_evaluator_provider,
};
use cex_core::{AIRPORT_FIELD, FieldError, IATA_FIELD, label_text};
use cex_storage::{
    CexOrder, EvaluationQuery, EvaluationRecord, PersistentEvaluationStore, StorageBackend,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ApiError, InitError};
use crate::http::{
    HttpRequest, HttpResponse, Incoming, is_timeout, read_request, write_http_response,
};

const DEFAULT_THRESHOLD: f64 = 0.5;
const DEFAULT_RECENT_LIMIT: usize = 20;
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

type SharedStore = Arc<Mutex<Box<dyn StorageBackend>>>;

pub struct CexServer {
    store: SharedStore,
    evaluator: Option<Arc<dyn EvaluatorProvider>>,
    ai_timeout: Duration,
    io_timeout: Duration,
    runtime: Runtime,
}

impl CexServer {
    pub fn new(store: Box<dyn StorageBackend>) -> Result<Self, InitError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("cex-ai")
            .enable_all()
            .build()?;
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            evaluator: None,
            ai_timeout: Duration::from_secs(15),
            io_timeout: DEFAULT_IO_TIMEOUT,
            runtime,
        })
    }

    pub fn with_db_path(path: impl AsRef<Path>) -> Result<Self, InitError> {
        let store = PersistentEvaluationStore::open(path)?;
        Self::new(Box::new(store))
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, InitError> {
        let mut server = Self::with_db_path(&config.db_path)?;
        server.ai_timeout = config.ai_timeout;
        server.io_timeout = config.http_timeout;
        if let Some(ai) = config.ai.clone() {
            info!(
                provider = ai.provider_name(),
                model = ai.model(),
                "AI evaluator enabled"
            );
            server.evaluator = Some(build_evaluator_provider(ai)?);
        }
        Ok(server)
    }

    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn EvaluatorProvider>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Bounds how long a connection may sit idle on a read or write.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn serve_http(&self, addr: &str) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.serve_listener(listener)
    }

    pub fn serve_listener(&self, listener: TcpListener) -> io::Result<()> {
        info!("cexd http listening on {}", listener.local_addr()?);
        thread::scope(|scope| {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        scope.spawn(move || {
                            if let Err(err) = self.handle_http_connection(stream) {
                                warn!("http request error: {err}");
                            }
                        });
                    }
                    Err(err) => {
                        warn!("http accept error: {err}");
                    }
                }
            }
        });
        Ok(())
    }

    fn handle_http_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        stream.set_read_timeout(Some(self.io_timeout))?;
        stream.set_write_timeout(Some(self.io_timeout))?;

        let incoming = match read_request(&mut BufReader::new(&stream)) {
            Ok(incoming) => incoming,
            Err(err) if is_timeout(&err) => {
                debug!("http connection idle past {:?}, closing", self.io_timeout);
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let response = match incoming {
            Incoming::Request(req) => self.handle(req),
            Incoming::Rejected(reason) => {
                warn!("rejected http request: {reason}");
                HttpResponse::json(400, &json!({ "error": reason }))
            }
            Incoming::Closed => return Ok(()),
        };
        write_http_response(&mut stream, &response)
    }

    /// Routes one request and renders any failure as a JSON error body.
    pub fn handle(&self, req: HttpRequest) -> HttpResponse {
        let started = Instant::now();
        let method = req.method.clone();
        let path = req.path.clone();

        let response = match self.dispatch(&req) {
            Ok(response) => response,
            Err(err) => {
                if err.is_client_error() {
                    warn!(%method, %path, status = err.status(), "{err}");
                } else {
                    error!(%method, %path, status = err.status(), "{err}");
                }
                HttpResponse::from(err)
            }
        };

        debug!(
            %method,
            %path,
            status = response.status,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request handled"
        );
        response
    }

    fn dispatch(&self, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
        if req.method == "OPTIONS" {
            return Ok(HttpResponse::empty(204));
        }

        let path = normalize_path(&req.path);
        let method = req.method.as_str();
        match path {
            "/" => {
                allow(method, "GET")?;
                Ok(HttpResponse::json(200, &json!({ "online": true })))
            }
            "/health" => {
                allow(method, "GET")?;
                Ok(HttpResponse::json(200, &json!({ "status": "ok" })))
            }
            "/calculate_cex" => {
                allow(method, "POST")?;
                self.calculate(&req.body)
            }
            "/api/cex" | "/cex" => {
                allow(method, "POST")?;
                self.submit(&req.body)
            }
            "/api/evaluate" => {
                allow(method, "POST")?;
                self.auto_evaluate(&req.body)
            }
            "/api/airports" => {
                allow(method, "GET")?;
                self.records(&EvaluationQuery::default())
            }
            "/api/airports/desc" => {
                allow(method, "GET")?;
                self.records(&EvaluationQuery::ordered(CexOrder::Descending))
            }
            "/api/airports/asc" => {
                allow(method, "GET")?;
                self.records(&EvaluationQuery::ordered(CexOrder::Ascending))
            }
            "/api/airports/cex_above" => {
                allow(method, "GET")?;
                let query = EvaluationQuery {
                    min_cex: Some(threshold(req)),
                    ..EvaluationQuery::ordered(CexOrder::Descending)
                };
                self.records(&query)
            }
            "/api/airports/cex_below" => {
                allow(method, "GET")?;
                let query = EvaluationQuery {
                    below_cex: Some(threshold(req)),
                    ..EvaluationQuery::ordered(CexOrder::Ascending)
                };
                self.records(&query)
            }
            "/api/search" | "/api/airports/search" => {
                allow(method, "GET")?;
                self.search(req)
            }
            "/api/recent" => {
                allow(method, "GET")?;
                let limit = req
                    .query
                    .get("limit")
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(DEFAULT_RECENT_LIMIT)
                    .clamp(1, 500);
                let rows = self.store.lock().list(limit);
                json_response(&rows)
            }
            "/api/stats" => {
                allow(method, "GET")?;
                let stats = self.store.lock().stats();
                Ok(HttpResponse::json(200, &stats))
            }
            other => {
                let code = other
                    .strip_prefix("/api/airports/")
                    .or_else(|| other.strip_prefix("/api/airport/"))
                    .filter(|code| !code.is_empty() && !code.contains('/'));
                match code {
                    Some(code) => {
                        allow(method, "GET")?;
                        self.airport_by_code(code)
                    }
                    None => Err(ApiError::NotFound),
                }
            }
        }
    }

    fn calculate(&self, body: &[u8]) -> Result<HttpResponse, ApiError> {
        let payload = parse_object(body)?;
        let computed = cex_core::evaluate(&payload)?;
        json_response(&computed.result)
    }

    fn submit(&self, body: &[u8]) -> Result<HttpResponse, ApiError> {
        let payload = parse_object(body)?;
        let computed = cex_core::evaluate(&payload)?;
        let saved = self.store.lock().insert(computed.record)?;
        info!(id = %saved.id, iata = %saved.iata, cex = saved.cex, "evaluation stored");
        json_response(&computed.result)
    }

    fn records(&self, query: &EvaluationQuery) -> Result<HttpResponse, ApiError> {
        let rows = self.store.lock().query(query);
        json_response(&rows)
    }

    fn search(&self, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let needle = req.query.get("q").map(|q| q.trim()).unwrap_or_default();
        if needle.is_empty() {
            return json_response(&Vec::<EvaluationRecord>::new());
        }
        let query = EvaluationQuery {
            airport_contains: Some(needle.to_string()),
            ..EvaluationQuery::ordered(CexOrder::Descending)
        };
        self.records(&query)
    }

    fn airport_by_code(&self, code: &str) -> Result<HttpResponse, ApiError> {
        let row = self
            .store
            .lock()
            .latest_by_iata(code)
            .ok_or(ApiError::AirportNotFound)?;
        json_response(&row)
    }

    /// Asks the AI provider for the 12 sub-metrics, then runs the submit flow on them.
    fn auto_evaluate(&self, body: &[u8]) -> Result<HttpResponse, ApiError> {
        let payload = parse_object(body)?;
        let iata = required_label(&payload, IATA_FIELD)?;
        let airport = required_label(&payload, AIRPORT_FIELD)?;
        let provider = self.provider_for(&payload)?;

        info!(provider = provider.name(), %iata, "requesting AI evaluation");
        let reply = self
            .runtime
            .block_on(provider.evaluate(EvaluationPrompt::new(airport.clone(), iata.clone())))?;

        let mut scored = reply.metrics.clone();
        scored.insert(IATA_FIELD.to_string(), Value::String(iata));
        scored.insert(AIRPORT_FIELD.to_string(), Value::String(airport));
        let computed = cex_core::evaluate(&scored).map_err(ApiError::UpstreamScores)?;
        let saved = self.store.lock().insert(computed.record)?;
        info!(id = %saved.id, iata = %saved.iata, cex = saved.cex, "AI evaluation stored");

        Ok(HttpResponse::json(
            200,
            &json!({
                "calculation": to_value(&computed.result)?,
                "saved": to_value(&saved)?,
                "metrics": reply.metrics,
                "provider": reply.provider,
                "model": reply.model,
            }),
        ))
    }

    fn provider_for(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<Arc<dyn EvaluatorProvider>, ApiError> {
        let provider = non_blank(payload, "provider");
        let api_key = non_blank(payload, "api_key");
        match (provider, api_key) {
            (Some(provider), Some(api_key)) => {
                let model = non_blank(payload, "model").map(str::to_string);
                let cfg = EvaluatorProviderConfig::from_parts(provider, api_key, model)?
                    .with_timeout(self.ai_timeout);
                Ok(build_evaluator_provider(cfg)?)
            }
            (None, None) => self.evaluator.clone().ok_or_else(|| {
                ApiError::Provider(ProviderError::Config(
                    "AI evaluator is not configured; supply provider and api_key".to_string(),
                ))
            }),
            _ => Err(ApiError::BadRequest(
                "provider and api_key must be supplied together".to_string(),
            )),
        }
    }
}

fn normalize_path(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn allow(method: &str, expected: &str) -> Result<(), ApiError> {
    if method == expected {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed)
    }
}

fn threshold(req: &HttpRequest) -> f64 {
    req.query
        .get("threshold")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|t| t.is_finite())
        .unwrap_or(DEFAULT_THRESHOLD)
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::MalformedPayload),
    }
}

fn required_label(payload: &Map<String, Value>, field: &'static str) -> Result<String, ApiError> {
    match payload.get(field) {
        Some(value) => Ok(label_text(Some(value))),
        None => Err(FieldError::Missing(field).into()),
    }
}

fn non_blank<'a>(payload: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|err| ApiError::Internal(err.to_string()))
}

fn json_response<T: Serialize>(value: &T) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::json(200, &to_value(value)?))
}
