// Statement Reconciliation - Web Server
// REST API with Axum; the dashboard lives elsewhere and only consumes JSON.
//
// RECON_DB      SQLite file (default statements.db)
// RECON_CONFIG  pipeline configuration JSON (optional)
// RECON_ADDR    bind address (default 0.0.0.0:3000)

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use statement_recon::{
    db, open_database, upsert_statement, BankId, BankRegistry, CollectionRecord, DocumentInput,
    MemorySource, PageContent, PipelineConfig, PositionalPage, ReconciliationPipeline,
    TabularPage, Warning,
};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    registry: Arc<BankRegistry>,
    pipeline: Arc<ReconciliationPipeline>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<Warning>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        Self::with_warnings(data, Vec::new())
    }

    fn with_warnings(data: T, warnings: Vec<Warning>) -> Response {
        let body = ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            warnings,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

fn fail(status: StatusCode, message: impl Into<String>, warnings: Vec<Warning>) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message.into()),
        warnings,
    };
    (status, Json(body)).into_response()
}

#[derive(Serialize)]
struct BankInfo {
    code: &'static str,
    name: &'static str,
    language: String,
    aliases: &'static [&'static str],
    columns: Vec<&'static str>,
}

/// One document in a request: plain text, positional pages or table rows
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    pages: Option<Vec<PositionalPage>>,
    #[serde(default)]
    rows: Option<Vec<Vec<String>>>,
    /// Manual bank choice; skips detection
    #[serde(default)]
    bank: Option<String>,
}

impl DocumentRequest {
    fn into_input(self) -> std::result::Result<DocumentInput<MemorySource>, String> {
        let name = self.name.unwrap_or_else(|| "upload".to_string());
        let source = if let Some(pages) = self.pages {
            MemorySource::new(&name, pages.into_iter().map(PageContent::Positional).collect())
        } else if let Some(rows) = self.rows {
            MemorySource::new(&name, vec![PageContent::Tabular(TabularPage { rows })])
        } else if let Some(text) = self.text {
            MemorySource::from_text(&name, &text)
        } else {
            return Err(format!("{}: one of text, pages or rows is required", name));
        };

        let input = DocumentInput::new(source);
        match self.bank.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(bank) => Ok(input.with_bank(bank.parse::<BankId>()?)),
            None => Ok(input),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest {
    #[serde(flatten)]
    document: DocumentRequest,
    #[serde(default)]
    processing_date: Option<NaiveDate>,
    /// Persist the statement when extraction succeeds
    #[serde(default)]
    store: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileRequest {
    documents: Vec<DocumentRequest>,
    #[serde(default)]
    collections: Vec<CollectionRecord>,
    #[serde(default)]
    processing_date: Option<NaiveDate>,
    #[serde(default)]
    store: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/banks - Supported banks
async fn list_banks(State(state): State<AppState>) -> Response {
    let banks: Vec<BankInfo> = state
        .registry
        .all()
        .iter()
        .map(|p| BankInfo {
            code: p.id.code(),
            name: p.id.name(),
            language: format!("{:?}", p.language),
            aliases: p.id.aliases(),
            columns: p.templates.iter().map(|t| t.name).collect(),
        })
        .collect();
    ApiResponse::ok(banks)
}

/// POST /api/extract - Extract one statement
async fn extract(State(state): State<AppState>, Json(request): Json<ExtractRequest>) -> Response {
    let input = match request.document.into_input() {
        Ok(input) => input,
        Err(e) => return fail(StatusCode::BAD_REQUEST, e, Vec::new()),
    };
    let processing_date = request.processing_date.unwrap_or_else(|| Utc::now().date_naive());

    let result = state
        .pipeline
        .extractor()
        .extract(&input.source, input.bank, processing_date)
        .await;

    let doc = match result.data {
        Some(doc) if result.success => doc,
        _ => {
            let message = result.errors.join("; ");
            return fail(StatusCode::UNPROCESSABLE_ENTITY, message, result.warnings);
        }
    };

    if request.store {
        if let Err(e) = with_db(&state, |conn| upsert_statement(conn, &doc.statement)) {
            return e;
        }
    }

    ApiResponse::with_warnings(doc, result.warnings)
}

/// POST /api/reconcile - Extract documents and match them against collections
async fn reconcile(State(state): State<AppState>, Json(request): Json<ReconcileRequest>) -> Response {
    let inputs = match request
        .documents
        .into_iter()
        .map(DocumentRequest::into_input)
        .collect::<std::result::Result<Vec<_>, _>>()
    {
        Ok(inputs) => inputs,
        Err(e) => return fail(StatusCode::BAD_REQUEST, e, Vec::new()),
    };
    let processing_date = request.processing_date.unwrap_or_else(|| Utc::now().date_naive());

    let report = state
        .pipeline
        .run(&inputs, &request.collections, processing_date, Utc::now())
        .await;

    if request.store {
        let stored = with_db(&state, |conn| {
            report
                .statements
                .iter()
                .map(|s| upsert_statement(conn, s))
                .collect::<Result<Vec<_>>>()
        });
        if let Err(e) = stored {
            return e;
        }
    }

    ApiResponse::ok(report)
}

/// GET /api/statements/:period - Stored statements for YYYY-MM
async fn statements_for_period(State(state): State<AppState>, Path(period): Path<String>) -> Response {
    if let Err(e) = db::parse_period(&period) {
        return fail(StatusCode::BAD_REQUEST, e.to_string(), Vec::new());
    }
    match with_db(&state, |conn| db::get_statements_for_period(conn, &period)) {
        Ok(statements) => ApiResponse::ok(statements),
        Err(e) => e,
    }
}

/// GET /api/risk/:period - Cross-bank bounced exposure for YYYY-MM
async fn risk_for_period(State(state): State<AppState>, Path(period): Path<String>) -> Response {
    if let Err(e) = db::parse_period(&period) {
        return fail(StatusCode::BAD_REQUEST, e.to_string(), Vec::new());
    }
    match with_db(&state, |conn| db::get_bounced_items_for_period(conn, &period)) {
        Ok(bounced) => ApiResponse::ok(state.pipeline.aggregator().analyze(&bounced)),
        Err(e) => e,
    }
}

/// Run a store operation, mapping failures to a 500
fn with_db<T>(state: &AppState, f: impl FnOnce(&Connection) -> Result<T>) -> std::result::Result<T, Response> {
    let conn = state
        .db
        .lock()
        .map_err(|_| fail(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned", Vec::new()))?;
    f(&*conn).map_err(|e| {
        error!(error = %e, "database error");
        fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), Vec::new())
    })
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/banks", get(list_banks))
        .route("/extract", post(extract))
        .route("/reconcile", post(reconcile))
        .route("/statements/:period", get(statements_for_period))
        .route("/risk/:period", get(risk_for_period))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

fn build_state(conn: Connection, config: &PipelineConfig) -> Result<AppState> {
    let registry = Arc::new(BankRegistry::new()?);
    Ok(AppState {
        db: Arc::new(Mutex::new(conn)),
        pipeline: Arc::new(ReconciliationPipeline::new(Arc::clone(&registry), config)),
        registry,
    })
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("RECON_CONFIG") {
        Ok(path) => PipelineConfig::from_file(path)?,
        Err(_) => PipelineConfig::default(),
    };
    let db_path = std::env::var("RECON_DB").unwrap_or_else(|_| "statements.db".to_string());
    let addr = std::env::var("RECON_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let conn = open_database(std::path::Path::new(&db_path))?;
    let state = build_state(conn, &config)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(%addr, db = %db_path, "server listening");

    axum::serve(listener, app(state))
        .await
        .context("Server stopped unexpectedly")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const BIAT: &str = "\
BANQUE INTERNATIONALE ARABE DE TUNISIE - BIAT
ETAT DE RAPPROCHEMENT AU 30/06/2025
SOLDE INITIAL : 15 450,000
REMISES NON CREDITEES
20/06/2025 23/06/2025 EFFET C1 REM0001 1 000,000
24/06/2025 26/06/2025 CHEQUE C2 REM0002 250,000
TOTAL REMISES 1 250,000
CHEQUES EMIS NON DEBITES
18/06/2025 0012345 SOTUVER SA 750,000
TOTAL CHEQUES 750,000
EFFETS IMPAYES
20/06/2025 25/06/2025 C3 PROVISION INSUFFISANTE 2 000,000
TOTAL IMPAYES 2 000,000
SOLDE FINAL : 15 950,000
";

    fn test_app() -> Router {
        let conn = Connection::open_in_memory().unwrap();
        statement_recon::setup_database(&conn).unwrap();
        app(build_state(conn, &PipelineConfig::default()).unwrap())
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_banks() {
        let (status, body) = call(test_app(), Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");

        let (_, body) = call(test_app(), Request::get("/api/banks").body(Body::empty()).unwrap()).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_extract_and_store_then_query_period() {
        let app = test_app();

        let (status, body) = call(
            app.clone(),
            post_json(
                "/api/extract",
                serde_json::json!({ "name": "biat.txt", "text": BIAT, "store": true }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["bank"], "BIAT");

        let (_, body) = call(app.clone(), Request::get("/api/statements/2025-06").body(Body::empty()).unwrap()).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = call(app, Request::get("/api/risk/2025-06").body(Body::empty()).unwrap()).await;
        assert_eq!(body["data"]["profiles"][0]["client_code"], "C3");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (status, body) = call(
            test_app(),
            post_json("/api/extract", serde_json::json!({ "name": "empty" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = call(test_app(), Request::get("/api/risk/june").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            test_app(),
            post_json("/api/extract", serde_json::json!({ "text": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_reconcile_endpoint() {
        let (status, body) = call(
            test_app(),
            post_json(
                "/api/reconcile",
                serde_json::json!({
                    "documents": [{ "name": "biat.txt", "text": BIAT, "bank": "biat" }],
                    "collections": [{
                        "client_code": "C1",
                        "amount": 1000000,
                        "instrument_type": "EFFET",
                        "draft_due_date": "2025-06-23",
                        "statement_date": "2025-06-30"
                    }],
                    "processingDate": "2025-07-01"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["summary"]["matches"]["perfect"], 1);
        assert_eq!(body["data"]["matches"][0]["match_type"], "draft");
    }
}
