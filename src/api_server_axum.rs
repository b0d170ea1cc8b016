use crate::gamma::gamma_commands::RunConfig;
use crate::gamma::snapshot::{ExposureSnapshot, build_snapshot};
use crate::gamma::yahoo_client::YahooClient;
use crate::history::{RAW_TABLE, SUMMARY_TABLE, Table, TabularStore};
use crate::utility::Timer;
use anyhow::Result;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

// -----------------------------------------------
// API REQUEST/RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    pub symbol: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub processing_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T, timer: &Timer) -> Self {
        Self { success: true, data: Some(data), error: None, processing_time_ms: Some(timer.elapsed_ms() as u64) }
    }

    fn err(error: impl ToString, timer: &Timer) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            processing_time_ms: Some(timer.elapsed_ms() as u64),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    pub week: String,
    pub structure_tags: String,
    pub dropped_quotes: usize,
    pub snapshot: ExposureSnapshot,
}

/// Table rows keyed by column name
pub type Records = Vec<BTreeMap<String, String>>;

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

#[derive(Clone)]
pub struct AppState {
    client: Arc<YahooClient>,
    cfg: Arc<RunConfig>,
    cache: Arc<RwLock<HashMap<String, (SnapshotResponse, Instant)>>>,
}

const CACHE_DURATION: Duration = Duration::from_secs(300); // 5 minutes

impl AppState {
    pub fn new(cfg: RunConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(YahooClient::new()?),
            cfg: Arc::new(cfg),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

/// GET /api/snapshot?symbol=SPY - live exposure snapshot
async fn get_snapshot(
    Query(query): Query<SymbolQuery>,
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<SnapshotResponse>>, StatusCode> {
    let timer = Timer::silent("api snapshot");
    let symbol = query.symbol.trim().to_uppercase();

    // Check cache first
    {
        let cache = app_state.cache.read().await;
        if let Some((cached, cached_at)) = cache.get(&symbol) {
            if cached_at.elapsed() < CACHE_DURATION {
                return Ok(Json(ApiResponse::ok(cached.clone(), &timer)));
            }
        }
    }

    let chain = match app_state.client.fetch_option_chain(&symbol).await {
        Ok(chain) => chain,
        Err(e) => return Ok(Json(ApiResponse::err(e, &timer))),
    };

    let Some(snapshot) = build_snapshot(&chain, app_state.cfg.risk_free_rate) else {
        return Ok(Json(ApiResponse::err(format!("No usable contracts for {}", symbol), &timer)));
    };

    let response = SnapshotResponse {
        week: snapshot.week(),
        structure_tags: snapshot.structure_tags().to_string(),
        dropped_quotes: chain.dropped,
        snapshot,
    };

    {
        let mut cache = app_state.cache.write().await;
        cache.insert(symbol, (response.clone(), Instant::now()));
    }

    Ok(Json(ApiResponse::ok(response, &timer)))
}

/// GET /api/history?symbol=SPY - stored raw rows of one symbol
async fn get_history(
    Query(query): Query<SymbolQuery>,
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<Records>>, StatusCode> {
    let timer = Timer::silent("api history");
    let symbol = query.symbol.trim().to_uppercase();

    match app_state.cfg.store().load(RAW_TABLE) {
        Ok(table) => {
            let rows = to_records(&table, |row| table.get(row, "symbol").trim() == symbol);
            Ok(Json(ApiResponse::ok(rows, &timer)))
        }
        Err(e) => Ok(Json(ApiResponse::err(e, &timer))),
    }
}

/// GET /api/summary - daily summary table
async fn get_summary(State(app_state): State<AppState>) -> Result<Json<ApiResponse<Records>>, StatusCode> {
    let timer = Timer::silent("api summary");

    match app_state.cfg.store().load(SUMMARY_TABLE) {
        Ok(table) => Ok(Json(ApiResponse::ok(to_records(&table, |_| true), &timer))),
        Err(e) => Ok(Json(ApiResponse::err(e, &timer))),
    }
}

// -----------------------------------------------
// HELPER FUNCTIONS
// -----------------------------------------------

fn to_records(table: &Table, keep: impl Fn(usize) -> bool) -> Records {
    (0..table.rows.len())
        .filter(|&row| keep(row))
        .map(|row| {
            table
                .header
                .iter()
                .enumerate()
                .map(|(col, name)| (name.clone(), table.cell(row, col).to_string()))
                .collect()
        })
        .collect()
}

// -----------------------------------------------
// SERVER SETUP
// -----------------------------------------------

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/history", get(get_history))
        .route("/api/summary", get(get_summary))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub async fn start_server(port: u16, cfg: RunConfig) -> Result<()> {
    let app = build_router(AppState::new(cfg)?);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "gamma API server listening");
    println!("🚀 Gamma API Server running on http://{}", addr);
    println!("📋 Available endpoints:");
    println!("   GET  /api/snapshot?symbol=SPY");
    println!("   GET  /api/history?symbol=SPY");
    println!("   GET  /api/summary");
    println!();

    axum::serve(listener, app).await?;
    Ok(())
}
