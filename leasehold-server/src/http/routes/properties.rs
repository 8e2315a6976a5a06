//! Property endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use leasehold_core::model::{
    CreatePropertyRequest, Property, PropertyListQuery, UpdatePropertyRequest,
};
use leasehold_core::Page;

use crate::http::error::ApiError;
use crate::http::extractors::{RequestCtx, ValidJson, ValidQuery, ValidUuid};
use crate::http::response::{created, ok, ApiResponse};
use crate::http::server::AppState;

/// GET /properties - filter by `owner_id` and `kind`
async fn list_properties(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidQuery((filter, page)): ValidQuery<PropertyListQuery>,
) -> Result<Json<ApiResponse<Page<Property>>>, ApiError> {
    let page = state.services.properties.list(&ctx, filter, page).await?;
    Ok(ok(page))
}

async fn create_property(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidJson(input): ValidJson<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Property>>), ApiError> {
    Ok(created(state.services.properties.create(&ctx, input).await?))
}

async fn get_property(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ApiResponse<Property>>, ApiError> {
    Ok(ok(state.services.properties.get(&ctx, id).await?))
}

async fn update_property(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
    ValidJson(update): ValidJson<UpdatePropertyRequest>,
) -> Result<Json<ApiResponse<Property>>, ApiError> {
    Ok(ok(state.services.properties.update(&ctx, id, update).await?))
}

async fn delete_property(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    state.services.properties.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Property routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/properties", get(list_properties).post(create_property))
        .route(
            "/properties/{id}",
            get(get_property)
                .put(update_property)
                .patch(update_property)
                .delete(delete_property),
        )
}
