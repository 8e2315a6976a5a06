//! Custom Axum extractors

use std::convert::Infallible;
use std::ops::Deref;
use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use leasehold_core::{AppError, Validate, ValidationError};
use serde::de::DeserializeOwned;
use tokio_util::sync::DropGuard;
use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;
use crate::context::RequestContext;

/// Request-scoped context: cancelled on shutdown, on timeout, or when the
/// handler future is dropped (client went away).
pub struct RequestCtx {
    ctx: RequestContext,
    _guard: DropGuard,
}

impl Deref for RequestCtx {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        &self.ctx
    }
}

impl FromRequestParts<Arc<AppState>> for RequestCtx {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ctx =
            RequestContext::child_of(&state.shutdown).with_timeout(state.request_timeout);
        let guard = ctx.token().clone().drop_guard();
        Ok(Self { ctx, _guard: guard })
    }
}

/// JSON body deserialized as `T` and validated into `T::Valid`.
///
/// Malformed JSON and failed validation are both `invalid` 400s.
pub struct ValidJson<T: Validate>(pub T::Valid);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: Validate + DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rej| ApiError(AppError::invalid(rej.body_text())))?;

        Ok(Self(body.validate()?))
    }
}

/// Query string deserialized as `T` and validated into `T::Valid`.
pub struct ValidQuery<T: Validate>(pub T::Valid);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: Validate + DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rej| ApiError(AppError::invalid(rej.body_text())))?;

        Ok(Self(query.validate()?))
    }
}

/// Extract and validate a UUID from path
pub struct ValidUuid(pub Uuid);

impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::from(ValidationError::Required { field: "id" }))?;

        let uuid = Uuid::parse_str(&id).map_err(|_| {
            ApiError::from(ValidationError::InvalidFormat {
                field: "id",
                reason: "invalid UUID format",
            })
        })?;

        Ok(Self(uuid))
    }
}
