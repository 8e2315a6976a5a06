//! Tenant onboarding: a new user and their first lease in one transaction

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use leasehold_core::model::{OnboardTenantRequest, Tenancy};

use crate::http::error::ApiError;
use crate::http::extractors::{RequestCtx, ValidJson};
use crate::http::response::ApiResponse;
use crate::http::server::AppState;

/// POST /onboarding
async fn onboard(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidJson(input): ValidJson<OnboardTenantRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Tenancy>>), ApiError> {
    let tenancy = state.services.onboard_tenant(&ctx, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(tenancy).with_message("Tenant onboarded")),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/onboarding", post(onboard))
}
