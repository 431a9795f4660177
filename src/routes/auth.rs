use axum::{extract::State, Form, Json};

use crate::{
    auth::{create_access_token, verify_password},
    error::{validation, AppError, AppResult},
    models,
    state::AppState,
    types::{LoginForm, Token},
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// `POST /login`: exchanges email + password for a bearer token.
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Json<Token>> {
    let email = validation::normalize_email(&form.username);
    let user = models::find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(form.password, user.password.clone()).await {
        tracing::info!(user_id = user.id, "login rejected: wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let access_token =
        create_access_token(user.id, &state.config.auth).map_err(|e| AppError::Internal(e.into()))?;
    Ok(Json(Token { access_token, token_type: "bearer".to_string() }))
}
