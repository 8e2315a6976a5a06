//! User endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use leasehold_core::model::{CreateUserRequest, UpdateUserRequest, User, UserListQuery};
use leasehold_core::Page;

use crate::http::error::ApiError;
use crate::http::extractors::{RequestCtx, ValidJson, ValidQuery, ValidUuid};
use crate::http::response::{created, ok, ApiResponse};
use crate::http::server::AppState;

type Reply<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// GET /users - list users, optionally filtered by role
async fn list_users(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidQuery((filter, page)): ValidQuery<UserListQuery>,
) -> Reply<Page<User>> {
    Ok(ok(state.services.users.list(&ctx, filter, page).await?))
}

/// POST /users
async fn create_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidJson(input): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let user = state.services.users.create(&ctx, input).await?;
    Ok(created(user))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
) -> Reply<User> {
    Ok(ok(state.services.users.get(&ctx, id).await?))
}

/// PUT|PATCH /users/{id} - fields absent from the body are left unchanged
async fn update_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
    ValidJson(update): ValidJson<UpdateUserRequest>,
) -> Reply<User> {
    Ok(ok(state.services.users.update(&ctx, id, update).await?))
}

/// DELETE /users/{id}
async fn delete_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestCtx,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    state.services.users.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::http::testing::{app, send};

    #[tokio::test]
    async fn create_validates_every_field() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/v1/users",
            Some(json!({"name": "A", "email": "not-an-email", "role": "landlord"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid");
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, ["name", "email", "role"]);
    }

    #[tokio::test]
    async fn malformed_json_is_invalid() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/v1/users",
            Some(json!("just a string")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "invalid");
    }

    #[tokio::test]
    async fn bad_id_is_invalid() {
        let (status, body) = send(&app(), Method::GET, "/api/v1/users/42", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "id");
    }

    #[tokio::test]
    async fn patch_then_delete() {
        let app = app();
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/v1/users",
            Some(json!({"name": "Ann", "email": "ann@x.com", "role": "user"})),
        )
        .await;
        let uri = format!("/api/v1/users/{}", body["data"]["id"].as_str().unwrap());

        let (status, body) =
            send(&app, Method::PATCH, &uri, Some(json!({"role": "admin"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role"], "admin");
        assert_eq!(body["data"]["name"], "Ann");

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_pages_and_filters() {
        let app = app();
        for (i, role) in ["user", "admin", "user"].iter().enumerate() {
            send(
                &app,
                Method::POST,
                "/api/v1/users",
                Some(json!({"name": format!("User {i}"), "email": format!("u{i}@x.com"), "role": role})),
            )
            .await;
        }

        let (status, body) =
            send(&app, Method::GET, "/api/v1/users?role=user&limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["limit"], 1);
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

        let (status, body) = send(&app, Method::GET, "/api/v1/users?role=owner", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "role");
    }
}
