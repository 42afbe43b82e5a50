use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::SharedState;
use crate::error::PriceError;
use crate::model::{ErrorResponse, HealthResponse, MergedRow};
use crate::pipeline::get_prices;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: PriceError) -> ApiError {
    (
        err.status_code(),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    year: Option<String>,
}

/// Absent or blank means `default`.
pub fn parse_year(raw: Option<&str>, default: i32) -> Result<i32, PriceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| PriceError::ClientInput(format!("year must be an integer, got {:?}", s))),
    }
}

pub async fn history_ajax(
    Query(params): Query<HistoryQuery>,
    State(state): State<SharedState>,
) -> Result<Json<Vec<MergedRow>>, ApiError> {
    let year = parse_year(params.year.as_deref(), state.default_year).map_err(error_response)?;

    match get_prices(&state.fetcher, year).await {
        Ok(rows) => Ok(Json(rows)),
        Err(err) => {
            tracing::error!("Failed to get prices for {}: {}", year, err);
            Err(error_response(err))
        }
    }
}
