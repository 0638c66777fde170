//! API route definitions.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use super::tools;
use crate::query::QueryError;

const DAY_FORMAT: &str = "%Y-%m-%d";

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/execution-status", get(execution_status))
        .route("/execution-statistics", get(execution_statistics))
        .route("/readiness", get(readiness))
}

/// Raw query pairs; keeps repeated keys such as `upstream=a&upstream=b`.
struct Params(Vec<(String, String)>);

impl Params {
    fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
    }

    fn required(&self, key: &str) -> ApiResult<String> {
        match self.first(key) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(ApiError::BadRequest(format!(
                "missing query parameter '{key}'"
            ))),
        }
    }

    fn date(&self, key: &str) -> ApiResult<NaiveDate> {
        let raw = self.required(key)?;
        NaiveDate::parse_from_str(&raw, DAY_FORMAT).map_err(|_| {
            ApiError::BadRequest(format!("'{key}' must be a YYYY-MM-DD date, got '{raw}'"))
        })
    }

    /// Upstream names from repeated `upstream` keys and comma-separated `upstreams`.
    fn upstreams(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(k, v)| match k.as_str() {
                "upstream" => vec![v.as_str()],
                "upstreams" => v.split(',').collect(),
                _ => Vec::new(),
            })
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn meta(state: &AppState) -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "source": state.service.describe_source(),
    })
}

fn envelope<T: Serialize>(data: &T, meta: Value) -> ApiResult<Json<Value>> {
    let data = serde_json::to_value(data).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(json!({ "data": data, "meta": meta })))
}

/// Run a query off the async runtime; loading the log is blocking I/O.
async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, QueryError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(err) => Err(ApiError::Internal(format!("query task failed: {err}"))),
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": meta(&state)
    }))
}

async fn list_tools(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let catalog = tools::catalog();
    let mut meta = meta(&state);
    meta["total"] = json!(catalog.len());
    envelope(&catalog, meta)
}

async fn execution_status(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let params = Params(pairs);
    let region = params.required("region")?;
    let pipeline = params.required("pipeline")?;
    let day = params.date("day")?;

    let service = state.service.clone();
    let status =
        blocking(move || service.execution_status(&region, &pipeline, day)).await?;
    envelope(&status, meta(&state))
}

async fn execution_statistics(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let params = Params(pairs);
    let region = params.required("region")?;
    let pipeline = params.required("pipeline")?;
    let from = params.date("from")?;
    let to = params.date("to")?;

    let service = state.service.clone();
    let report = blocking(move || service.statistics(&region, &pipeline, from, to)).await?;
    envelope(&report, meta(&state))
}

async fn readiness(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let params = Params(pairs);
    let region = params.required("region")?;
    let pipeline = params.required("pipeline")?;
    let day = params.date("day")?;
    let upstreams = params.upstreams();

    let service = state.service.clone();
    let report =
        blocking(move || service.readiness(&region, &pipeline, day, &upstreams)).await?;

    let mut meta = meta(&state);
    meta["duplicate_policy"] = json!(state.service.policy().as_str());
    envelope(&report, meta)
}
