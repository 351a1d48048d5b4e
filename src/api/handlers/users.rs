//! User directory handlers: create, list, get.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreateUserRequest, UserListResponse};
use crate::app_state::AppState;
use crate::domain::{NewUser, User, UserId};
use crate::error::{ErrorResponse, GatewayError};
use crate::persistence::EventStore;

/// `POST /users` — Register a user and their credential.
///
/// # Errors
///
/// - [`GatewayError::InvalidRequest`] on an empty name or credential.
/// - [`GatewayError::CredentialConflict`] if the credential is taken.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    summary = "Register a user",
    description = "Adds a user to the directory. Each credential belongs to at most one user.",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Credential already registered", body = ErrorResponse),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let new_user = NewUser::try_from(req)?;
    let user = state.store.insert_user(new_user).await?;
    tracing::info!(user_id = %user.id, credential = %user.credential_id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users` — List all users.
///
/// # Errors
///
/// Returns [`GatewayError::StorageFailure`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    summary = "List users",
    responses(
        (status = 200, description = "All users ordered by ID", body = UserListResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, GatewayError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into()))
}

/// `GET /users/{id}` — Get one user.
///
/// # Errors
///
/// Returns [`GatewayError::UserNotFound`] if the user does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    summary = "Get a user",
    params(
        ("id" = i64, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, GatewayError> {
    state
        .store
        .find_user(UserId::new(id))
        .await?
        .map(Json)
        .ok_or(GatewayError::UserNotFound(id))
}

/// User directory routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user))
}
