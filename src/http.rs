//! HTTP transport for the graph data contract.
//!
//! Exposes `GET /graph-data` (query parameters mapped onto
//! [`GraphRequest`]) and `GET /health`. Error responses carry the stable
//! error kind, the stable error code, a human-readable message, and an
//! execution id for traceability; a failed request never carries partial
//! graph data.
//!
//! Status mapping: validation 400, feature disabled 403, data unavailable
//! 503, compute timeout 504, internal 500.

use crate::error::GraphServiceError;
use crate::schema::{GraphRequest, RelationType, GRAPH_SCHEMA_VERSION};
use crate::service::GraphDataService;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Raw query parameters of `GET /graph-data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphDataParams {
    /// Comma-separated document ids
    pub document_filter: Option<String>,
    /// Comma-separated relation type names (knn, entity, anchor)
    pub relation_types: Option<String>,
    pub max_nodes: Option<usize>,
    pub anchor_filter: Option<String>,
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Stable error kind (e.g. "validation")
    pub error: String,
    /// Stable error code (e.g. "CGR-VAL-001")
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Unique id for this request, for log correlation
    pub execution_id: String,
}

/// Build the router for the graph data service.
///
/// CORS is permissive: the consumers are visualization front ends served
/// from other origins.
pub fn router(service: Arc<GraphDataService>) -> Router {
    Router::new()
        .route("/graph-data", get(graph_data_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Map query parameters onto a structured request.
///
/// Unknown relation type names are rejected here, at the edge, so the
/// service core only ever sees parsed [`RelationType`] values.
pub fn parse_params(params: &GraphDataParams) -> Result<GraphRequest, GraphServiceError> {
    let relation_types = match &params.relation_types {
        None => RelationType::all_set(),
        Some(raw) => {
            let mut set = std::collections::BTreeSet::new();
            for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let rt = RelationType::parse(name).ok_or_else(|| {
                    GraphServiceError::Validation(format!("unknown relation type: {name}"))
                })?;
                set.insert(rt);
            }
            set
        }
    };

    let document_filter = params.document_filter.as_ref().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    let mut request = GraphRequest {
        document_filter,
        relation_types,
        anchor_filter: params.anchor_filter.clone(),
        ..GraphRequest::default()
    };
    if let Some(max_nodes) = params.max_nodes {
        request.max_nodes = max_nodes;
    }
    Ok(request)
}

async fn graph_data_handler(
    State(service): State<Arc<GraphDataService>>,
    Query(params): Query<GraphDataParams>,
) -> Result<Json<crate::schema::GraphPayload>, (StatusCode, Json<ErrorBody>)> {
    let request = parse_params(&params).map_err(reject)?;
    let payload = service.graph_data(&request).await.map_err(reject)?;
    Ok(Json(payload))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "schema_version": GRAPH_SCHEMA_VERSION,
    }))
}

fn reject(err: GraphServiceError) -> (StatusCode, Json<ErrorBody>) {
    (
        status_for(&err),
        Json(ErrorBody {
            error: err.kind().to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
            execution_id: generate_execution_id(),
        }),
    )
}

fn status_for(err: &GraphServiceError) -> StatusCode {
    match err {
        GraphServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        GraphServiceError::FeatureDisabled(_) => StatusCode::FORBIDDEN,
        GraphServiceError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GraphServiceError::ComputeTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        GraphServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Unique execution id: 16 hex chars of SHA-256 over timestamp, pid and a
/// process-local counter.
pub fn generate_execution_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(count.to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
