use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::CurrentUser,
    models::{self, ImageFilter, Page},
    state::AppState,
    types::{ImageOut, SearchParams},
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_TERM_CHARS: usize = 100;

fn sanitize_search_term(raw: Option<String>, field: &str) -> Result<Option<String>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_TERM_CHARS {
        return Err(AppError::InvalidInput(format!("Search term '{}' too long", field)));
    }
    let sanitized: String = trimmed.chars().filter(|ch| !ch.is_control()).collect();
    Ok(Some(sanitized).filter(|s| !s.is_empty()))
}

/// `GET /search/images`: metadata search over images the caller may see.
pub async fn search_images(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<ImageOut>>> {
    let filter = ImageFilter {
        daytime: sanitize_search_term(params.daytime, "daytime")?,
        weather: sanitize_search_term(params.weather, "weather")?,
        indoor: params.indoor,
        primary_object: sanitize_search_term(params.primary_object, "primary_object")?,
    };
    let page = Page::new(params.limit.unwrap_or(DEFAULT_LIMIT), params.skip.unwrap_or(0));

    let images = models::search_images(&state.db, user.id(), &filter, page).await?;
    tracing::debug!(user_id = user.id(), hits = images.len(), "image search");
    Ok(Json(images.into_iter().map(ImageOut::from).collect()))
}
