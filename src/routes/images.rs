//! Image lifecycle: ingestion, privacy, listing and deletion.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppError, AppResult, OptionExt},
    imaging::{self, ImagingError, SceneLabels},
    middleware::CurrentUser,
    models::{self, Image, ImageFilter, NewImage, Page},
    services::classifier::UploadedFile,
    services::storage::UploadOptions,
    state::AppState,
    types::{ImageOut, Pagination, PrivateUpdate, UserImagesDeletion},
};

const DEFAULT_LIST_LIMIT: i64 = 20;

/// Multipart fields of an upload.
#[derive(Debug, Default)]
struct UploadForm {
    image: Option<UploadedFile>,
    user_prompt: Option<String>,
    dimensions: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?.to_vec();
                form.image = Some(UploadedFile { file_name, content_type, bytes });
            }
            Some("user_prompt") => form.user_prompt = Some(field.text().await?),
            Some("dimensions") => form.dimensions = Some(field.text().await?),
            other => tracing::debug!("ignoring multipart field {:?}", other),
        }
    }
    Ok(form)
}

/// `POST /images`: classify, re-encode, upload and index a new image.
pub async fn create_image(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ImageOut>)> {
    let form = read_upload_form(multipart).await?;

    let file = form
        .image
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("Empty image file".to_string()))?;
    let aspect_ratio = imaging::parse_dimensions(form.dimensions.as_deref().unwrap_or(""))
        .map_err(|_| AppError::BadRequest("Invalid dimensions format. Use 'width,height'".to_string()))?;

    let prompt = form.user_prompt.unwrap_or_default();
    let image = ingest_image(&state, user.id(), &file, &prompt, aspect_ratio).await?;
    Ok((StatusCode::CREATED, Json(image.into())))
}

/// Runs the ingestion workflow for an already validated upload.
pub async fn ingest_image(
    state: &AppState,
    owner_id: i64,
    file: &UploadedFile,
    prompt: &str,
    aspect_ratio: Option<f64>,
) -> AppResult<Image> {
    let classification = state.classifier.classify(file, prompt).await.inspect_err(|_| {
        state.metrics.inc_classifier_failures();
    })?;

    let png = imaging::reencode_png(&classification.image_base64).map_err(|e| {
        tracing::warn!("processed image rejected: {}", e);
        match e {
            ImagingError::Encode(_) => AppError::Upstream("Encoding failed".to_string()),
            _ => AppError::Upstream("Invalid processed image".to_string()),
        }
    })?;

    let scene = SceneLabels::from_classification(&classification.labels).ok_or_else(|| {
        tracing::warn!("classification has {} labels, expected 4", classification.labels.len());
        AppError::Upstream("Image processing failed".to_string())
    })?;
    let primary_object = imaging::primary_object(&classification.detections);

    let options = UploadOptions { folder: state.config.storage.folder.clone(), aspect_ratio };
    let uploaded = state.storage.upload(png, &options).await.map_err(|e| {
        tracing::error!("upload to cloud storage failed: {}", e);
        state.metrics.add_storage_failures(1);
        AppError::Upstream("Failed to upload image to cloud storage".to_string())
    })?;

    let new_image = NewImage {
        indoor: scene.indoor,
        daytime: scene.daytime,
        weather: scene.weather,
        image_url: uploaded.secure_url,
        public_id: uploaded.public_id,
        primary_object,
        filter1: classification.applied_filters.get(1).cloned(),
        filter2: classification.applied_filters.get(2).cloned(),
        owner_id,
    };
    let image = models::insert_image(&state.db, &new_image).await.inspect_err(|e| {
        tracing::warn!(public_id = %new_image.public_id, "image uploaded but not indexed: {}", e);
    })?;

    state.metrics.inc_images_uploaded();
    tracing::info!(image_id = image.id, owner_id, public_id = %image.public_id, "image ingested");
    Ok(image)
}

/// Loads an image and checks that `user` owns it.
async fn owned_image(state: &AppState, id: i64, user: &CurrentUser, action: &str) -> AppResult<Image> {
    let image = models::find_image(&state.db, id).await?.ok_or_not_found("Image")?;
    if image.owner_id != user.id() {
        return Err(AppError::Forbidden(format!("Not authorized to {} this image", action)));
    }
    Ok(image)
}

/// `DELETE /images/{id}`: removes the cloud object, then the row.
pub async fn delete_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let image = owned_image(&state, id, &user, "delete").await?;

    let destroyed = state.storage.destroy(&image.public_id, true).await.map_err(|e| {
        tracing::error!(public_id = %image.public_id, "cloud delete failed: {}", e);
        state.metrics.add_storage_failures(1);
        AppError::Upstream("Failed to delete image from cloud storage".to_string())
    })?;
    if !destroyed.is_success() {
        state.metrics.add_storage_failures(1);
        tracing::error!(public_id = %image.public_id, result = %destroyed.result, "cloud delete refused");
        return Err(AppError::Upstream("Cloud storage deletion failed".to_string()));
    }

    models::delete_image(&state.db, id).await.inspect_err(|e| {
        tracing::warn!(image_id = id, "cloud object removed but row kept: {}", e);
    })?;
    state.metrics.add_images_deleted(1);
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /images/{id}/private`
pub async fn update_image_privacy(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<PrivateUpdate>,
) -> AppResult<Json<ImageOut>> {
    owned_image(&state, id, &user, "update").await?;
    let image = models::set_image_private(&state.db, id, payload.private).await?.ok_or_not_found("Image")?;
    Ok(Json(image.into()))
}

/// `GET /images/{id}`: hidden images answer 404 so their existence does not leak.
pub async fn get_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ImageOut>> {
    let image = models::find_image(&state.db, id)
        .await?
        .filter(|img| img.owner_id == user.id() || !img.private)
        .ok_or_not_found("Image")?;
    Ok(Json(image.into()))
}

/// `GET /images`: everything the caller may see, newest first.
pub async fn list_images(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(p): Query<Pagination>,
) -> AppResult<Json<Vec<ImageOut>>> {
    let page = Page::new(p.limit.unwrap_or(DEFAULT_LIST_LIMIT), p.skip.unwrap_or(0));
    let images = models::search_images(&state.db, user.id(), &ImageFilter::default(), page).await?;
    Ok(Json(images.into_iter().map(ImageOut::from).collect()))
}

/// Removes every image of `user_id` from cloud storage.
///
/// Failures are collected by `public_id` instead of aborting; nothing is rolled
/// back. With `delete_db_records` each successfully destroyed row is deleted too,
/// and a row that cannot be deleted is reported as a failure as well.
pub async fn delete_images_for_user(
    state: &AppState,
    user_id: i64,
    delete_db_records: bool,
) -> AppResult<UserImagesDeletion> {
    let images = models::images_owned_by(&state.db, user_id).await?;
    let mut report = UserImagesDeletion { total: images.len(), ..Default::default() };

    for img in images {
        match state.storage.destroy(&img.public_id, false).await {
            Ok(res) if res.is_success() => {
                report.cloud_deleted += 1;
                if delete_db_records {
                    match models::delete_image(&state.db, img.id).await {
                        Ok(_) => report.db_deleted += 1,
                        Err(e) => {
                            tracing::warn!(image_id = img.id, public_id = %img.public_id, "row delete failed: {}", e);
                            report.failures.push(img.public_id);
                        }
                    }
                }
            }
            Ok(res) => {
                tracing::warn!(public_id = %img.public_id, result = %res.result, "cloud delete refused");
                report.failures.push(img.public_id);
            }
            Err(e) => {
                tracing::warn!(public_id = %img.public_id, "cloud delete failed: {}", e);
                report.failures.push(img.public_id);
            }
        }
    }

    state.metrics.add_storage_failures(report.failures.len() as u64);
    tracing::info!(
        user_id,
        total = report.total,
        cloud_deleted = report.cloud_deleted,
        db_deleted = report.db_deleted,
        failures = report.failures.len(),
        "bulk image deletion finished"
    );
    Ok(report)
}

/// Images of `owner_id` visible to `requester_id`, with the visible total.
pub async fn get_images_for_user(
    state: &AppState,
    owner_id: i64,
    requester_id: Option<i64>,
    page: Page,
) -> AppResult<(Vec<ImageOut>, i64)> {
    let (rows, total) = models::images_for_owner(&state.db, owner_id, requester_id, page).await?;
    Ok((rows.into_iter().map(ImageOut::from).collect(), total))
}
