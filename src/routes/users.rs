use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    Json,
};

use crate::{
    auth::{hash_password, verify_password},
    error::{validation, AppError, AppResult},
    middleware::CurrentUser,
    models::{self, Page},
    routes::images::{delete_images_for_user, get_images_for_user},
    state::AppState,
    types::{ImageOut, Pagination, PasswordUpdate, UserCreate, UserOut},
};

const DEFAULT_USER_IMAGES_LIMIT: i64 = 100;

fn user_missing(id: i64) -> AppError {
    AppError::NotFound(format!("User with id: {} does not exist", id))
}

/// `POST /users`
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserCreate>,
) -> AppResult<(StatusCode, Json<UserOut>)> {
    validation::validate_non_empty(&payload.username, "username")?;
    validation::validate_non_empty(&payload.password, "password")?;
    validation::validate_non_negative(payload.age, "age")?;
    let email = validation::normalize_email(&payload.email);
    validation::validate_email(&email)?;

    let hashed = hash_password(payload.password, state.config.auth.bcrypt_cost).await?;
    let user = models::insert_user(&state.db, &payload.username, payload.age, &email, &hashed)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!("Email {} is already registered", email)),
            other => other,
        })?;

    state.metrics.inc_users_created();
    tracing::info!(user_id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `GET /users/{id}`
pub async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<UserOut>> {
    let user = models::find_user(&state.db, id).await?.ok_or_else(|| user_missing(id))?;
    Ok(Json(user.into()))
}

/// `DELETE /users/{id}`: only once every owned image is gone from cloud storage.
pub async fn delete_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let user = models::find_user(&state.db, id).await?.ok_or_else(|| user_missing(id))?;
    if user.id != caller.id() {
        return Err(AppError::Forbidden("Not authorized to perform requested action".to_string()));
    }

    let report = delete_images_for_user(&state, id, false).await?;
    if !report.failures.is_empty() {
        return Err(AppError::Upstream(format!(
            "Failed to delete some images from cloud storage: {:?}",
            report.failures
        )));
    }

    // Image rows follow through ON DELETE CASCADE
    models::delete_user(&state.db, id).await?;
    state.metrics.add_images_deleted(report.cloud_deleted as u64);
    state.metrics.inc_users_deleted();
    tracing::info!(user_id = id, images = report.total, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /users/{id}/password`
pub async fn update_password(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<PasswordUpdate>,
) -> AppResult<StatusCode> {
    if id != caller.id() {
        return Err(AppError::Forbidden("Not authorized to change this user's password".to_string()));
    }
    let user = models::find_user(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(payload.old_password, user.password).await {
        return Err(AppError::Unauthorized("Old password is incorrect".to_string()));
    }
    validation::validate_non_empty(&payload.new_password, "new_password")?;

    let hashed = hash_password(payload.new_password, state.config.auth.bcrypt_cost).await?;
    models::update_user_password(&state.db, id, &hashed).await?;
    tracing::info!(user_id = id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /users/{id}/images`: private images only for the owner; total in `x-total-count`.
pub async fn get_user_images(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<i64>,
    Query(p): Query<Pagination>,
) -> AppResult<(HeaderMap, Json<Vec<ImageOut>>)> {
    models::find_user(&state.db, id).await?.ok_or_else(|| user_missing(id))?;

    let page = Page::new(p.limit.unwrap_or(DEFAULT_USER_IMAGES_LIMIT), p.skip.unwrap_or(0));
    let (images, total) = get_images_for_user(&state, id, Some(caller.id()), page).await?;

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("x-total-count"), HeaderValue::from(total));
    Ok((headers, Json(images)))
}
