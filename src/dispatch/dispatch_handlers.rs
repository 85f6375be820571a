use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, Result},
    state::AppState,
};

use super::{
    dispatch_job::{DispatchOutcome, DispatchReport},
    scheduler::run_exclusive,
};

pub const DISPATCH_SECRET_HEADER: &str = "x-dispatch-secret";

#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchResponse {
    pub message: String,
    pub report: Option<DispatchReport>,
}

fn secrets_match(expected: &str, provided: &str) -> bool {
    expected.len() == provided.len()
        && expected
            .bytes()
            .zip(provided.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Run the watering reminder dispatch now
#[utoipa::path(
    post,
    path = "/api/dispatch/run",
    params(("x-dispatch-secret" = String, Header, description = "Shared trigger secret")),
    responses(
        (status = 200, description = "Dispatch finished or already running", body = DispatchResponse),
        (status = 401, description = "Missing or wrong trigger secret"),
        (status = 404, description = "Trigger disabled")
    ),
    tag = "dispatch"
)]
pub async fn trigger_dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DispatchResponse>> {
    let Some(expected) = state.config.dispatch_trigger_secret.as_deref() else {
        return Err(AppError::NotFound("Not found".to_string()));
    };

    let provided = headers
        .get(DISPATCH_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !secrets_match(expected, provided) {
        return Err(AppError::Unauthorized("Invalid dispatch secret".to_string()));
    }

    let response = match run_exclusive(&state.db, state.dispatch_job.as_ref()).await? {
        DispatchOutcome::Completed(report) => DispatchResponse {
            message: "Notifications sent".to_string(),
            report: Some(report),
        },
        DispatchOutcome::Skipped => DispatchResponse {
            message: "Dispatch already running".to_string(),
            report: None,
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3creT"));
        assert!(!secrets_match("s3cret", "s3cret!"));
        assert!(!secrets_match("s3cret", ""));
    }
}
