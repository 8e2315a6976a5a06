//! Lease endpoints, including terminate and renew

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use leasehold_core::model::{
    CreateLeaseRequest, Lease, LeaseListQuery, Renewal, RenewLeaseRequest,
    TerminateLeaseRequest, UpdateLeaseRequest,
};
use leasehold_core::Page;

use crate::http::error::ApiError;
use crate::http::extractors::{RequestCtx, ValidJson, ValidQuery, ValidUuid};
use crate::http::response::{created, ok, ApiResponse};
use crate::http::server::AppState;

/// GET /leases - filter by `property_id`, `tenant_id` and `status`
async fn list_leases(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidQuery((filter, page)): ValidQuery<LeaseListQuery>,
) -> Result<Json<ApiResponse<Page<Lease>>>, ApiError> {
    Ok(ok(state.services.leases.list(&ctx, filter, page).await?))
}

/// POST /leases - the active-lease check and insert share a transaction
async fn create_lease(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidJson(input): ValidJson<CreateLeaseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Lease>>), ApiError> {
    Ok(created(state.services.create_lease(&ctx, input).await?))
}

async fn get_lease(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ApiResponse<Lease>>, ApiError> {
    Ok(ok(state.services.leases.get(&ctx, id).await?))
}

async fn update_lease(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
    ValidJson(update): ValidJson<UpdateLeaseRequest>,
) -> Result<Json<ApiResponse<Lease>>, ApiError> {
    let lease = state
        .services
        .transaction(&ctx, |tx, ctx| async move {
            tx.leases.update(&ctx, id, update).await
        })
        .await?;
    Ok(ok(lease))
}

async fn delete_lease(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    state.services.leases.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /leases/{id}/terminate - body `{}` ends the lease today
async fn terminate_lease(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
    ValidJson(end_date): ValidJson<TerminateLeaseRequest>,
) -> Result<Json<ApiResponse<Lease>>, ApiError> {
    let lease = state.services.leases.terminate(&ctx, id, end_date).await?;
    Ok(ok(lease))
}

/// POST /leases/{id}/renew
async fn renew_lease(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
    ValidJson(input): ValidJson<RenewLeaseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Renewal>>), ApiError> {
    let renewal = state.services.renew_lease(&ctx, id, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(renewal).with_message("Lease renewed")),
    ))
}

/// Lease routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/leases", get(list_leases).post(create_lease))
        .route(
            "/leases/{id}",
            get(get_lease)
                .put(update_lease)
                .patch(update_lease)
                .delete(delete_lease),
        )
        .route("/leases/{id}/terminate", post(terminate_lease))
        .route("/leases/{id}/renew", post(renew_lease))
}
