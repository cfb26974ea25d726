use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use common::MediaVisibility;
use tokio_util::io::ReaderStream;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, EditorUser};
use crate::extractors::json::AppJson;
use crate::models::media::*;
use crate::models::shared::{ApiOk, Data, MessageResponse};
use crate::services::media::{MediaService, UploadInput};
use crate::state::AppState;
use crate::utils::mime;

/// Room for multipart framing and the text fields on top of the file cap.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_body_limit(config: &MediaConfig) -> DefaultBodyLimit {
    DefaultBodyLimit::max(config.max_upload_bytes + MULTIPART_OVERHEAD)
}

fn media_service(state: &AppState) -> MediaService<'_, sea_orm::DatabaseConnection> {
    MediaService::new(&state.db, state.storage.as_ref(), &state.config.media)
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Media",
    operation_id = "uploadMedia",
    summary = "Upload a media file",
    description = "Requires EDITOR. Multipart fields: `file` (required), `visibility` (`public` or `private`, \
        default `public`) and `alt_text`. The type must be on the allow-list and raster images must carry \
        matching magic bytes. Rejected uploads store nothing. `POST /media` is an alias.",
    request_body(content = UploadMediaForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Asset stored", body = MediaResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 503, description = "Storage not configured (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, editor, multipart), fields(owner_id = editor.user_id))]
pub async fn upload_media(
    editor: EditorUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = state.config.media.max_upload_bytes;

    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut visibility = MediaVisibility::Public;
    let mut alt_text: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
                let declared = field.content_type().map(str::to_string);

                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
                {
                    if bytes.len() + chunk.len() > max_size {
                        return Err(AppError::Validation(format!(
                            "File exceeds the maximum size of {max_size} bytes"
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                file = Some((filename, declared, bytes));
            }
            Some("visibility") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read visibility: {e}")))?;
                visibility = match text.trim() {
                    "public" => MediaVisibility::Public,
                    "private" => MediaVisibility::Private,
                    _ => {
                        return Err(AppError::Validation(
                            "visibility must be one of: public, private".into(),
                        ));
                    }
                };
            }
            Some("alt_text") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read alt_text: {e}")))?;
                alt_text = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let (filename, declared_type, bytes) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    let asset = media_service(&state)
        .upload(
            UploadInput {
                filename,
                declared_type,
                bytes,
                visibility,
                alt_text,
            },
            editor.user_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::data(asset))))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Media",
    operation_id = "createMedia",
    summary = "Upload a media file",
    description = "Same as `POST /media/upload`.",
    request_body(content = UploadMediaForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Asset stored", body = MediaResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 503, description = "Storage not configured (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
pub async fn create_media(
    editor: EditorUser,
    state: State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    upload_media(editor, state, multipart).await
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Media",
    operation_id = "listMedia",
    summary = "List media assets",
    description = "Requires EDITOR. Newest first. `content_type` accepts an exact type or a top-level prefix such as `image`.",
    params(MediaListQuery),
    responses(
        (status = 200, description = "Assets", body = MediaListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor, query))]
pub async fn list_media(
    _editor: EditorUser,
    State(state): State<AppState>,
    Query(query): Query<MediaListQuery>,
) -> Result<Json<ApiOk<MediaListResponse>>, AppError> {
    let media = media_service(&state).list(&query).await?;
    Ok(Json(ApiOk::new(media)))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Media",
    operation_id = "getMediaStats",
    summary = "Media library statistics",
    description = "Requires EDITOR. Asset count, stored bytes, visibility split and usage per top-level type.",
    responses(
        (status = 200, description = "Statistics", body = MediaStats),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn media_stats(
    _editor: EditorUser,
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Data<MediaStats>>>, AppError> {
    let stats = media_service(&state).stats().await?;
    Ok(Json(ApiOk::data(stats)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Media",
    operation_id = "getMedia",
    summary = "Get a media asset",
    description = "Requires EDITOR.",
    params(("id" = Uuid, Path, description = "Media asset ID")),
    responses(
        (status = 200, description = "Asset", body = MediaResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn get_media(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<Data<MediaResponse>>>, AppError> {
    let asset = media_service(&state).get(id).await?;
    Ok(Json(ApiOk::data(asset)))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Media",
    operation_id = "updateMedia",
    summary = "Update asset metadata",
    description = "Requires EDITOR. Changes `alt_text` (null clears it) and `visibility`.",
    params(("id" = Uuid, Path, description = "Media asset ID")),
    request_body = UpdateMediaRequest,
    responses(
        (status = 200, description = "Updated asset", body = MediaResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor, payload))]
pub async fn update_media(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateMediaRequest>,
) -> Result<Json<ApiOk<Data<MediaResponse>>>, AppError> {
    validate_alt_text(payload.alt_text.as_ref().and_then(|a| a.as_deref()))?;
    let asset = media_service(&state).update(id, payload).await?;
    Ok(Json(ApiOk::data(asset)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Media",
    operation_id = "deleteMedia",
    summary = "Delete a media asset",
    description = "Requires EDITOR and ownership, or ADMIN. Assets still used by a project gallery cannot be deleted.",
    params(("id" = Uuid, Path, description = "Media asset ID")),
    responses(
        (status = 200, description = "Asset deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Asset in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, editor), fields(actor_id = editor.user_id))]
pub async fn delete_media(
    editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    media_service(&state).delete(id, &editor).await?;
    Ok(Json(ApiOk::new(MessageResponse::new("Media deleted"))))
}

#[utoipa::path(
    get,
    path = "/{id}/signed-url",
    tag = "Media",
    operation_id = "getSignedMediaUrl",
    summary = "Create a time-limited download URL",
    description = "Any authenticated user for public assets. Private assets need EDITOR or ownership.",
    params(("id" = Uuid, Path, description = "Media asset ID")),
    responses(
        (status = 200, description = "Signed URL", body = SignedUrlResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Storage not configured (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn signed_url(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<Data<SignedUrlResponse>>>, AppError> {
    let ttl = Duration::from_secs(state.config.storage.signed_url_ttl_secs);
    let signed = media_service(&state).signed_url(id, &auth_user, ttl).await?;
    Ok(Json(ApiOk::data(signed)))
}

/// Serve an object of the filesystem backend. Public assets are served as
/// is; private ones need the `expires` and `signature` of a signed URL.
#[instrument(skip(state, query, headers))]
pub async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedFileQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let service = media_service(&state);
    let asset = service.find_by_key(&key).await?;

    if asset.visibility == MediaVisibility::Private {
        let (Some(expires), Some(signature)) = (query.expires, query.signature.as_deref()) else {
            return Err(AppError::PermissionDenied);
        };
        if !state
            .file_signer
            .verify(&key, expires, signature, Utc::now().timestamp())
        {
            warn!(key = %key, "Rejected signed file URL");
            return Err(AppError::PermissionDenied);
        }
    }

    let etag = format!("\"{}\"", asset.checksum);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && val == etag
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let store = state
        .storage
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Object storage is not configured".into()))?;
    let reader = store.get_stream(&asset.storage_key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let cache_control = match asset.visibility {
        MediaVisibility::Public => "public, max-age=86400",
        MediaVisibility::Private => "private, no-store",
    };

    let inline = !mime::is_scriptable(&asset.content_type);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &asset.content_type)
        .header(header::CONTENT_LENGTH, asset.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&asset.filename, inline),
        )
        .header(header::ETAG, &etag)
        .header(header::CACHE_CONTROL, cache_control)
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .header(header::CONTENT_SECURITY_POLICY, FILE_CSP)
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

/// Served files run no scripts and load nothing, even when opened directly.
const FILE_CSP: &str =
    "default-src 'none'; img-src 'self' data:; style-src 'unsafe-inline'; sandbox";

/// `inline` or `attachment` disposition with an ASCII fallback and an
/// RFC 5987 `filename*`.
fn content_disposition_value(filename: &str, inline: bool) -> String {
    let ascii: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii = if ascii.is_empty() { "file".to_string() } else { ascii };

    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect();

    let kind = if inline { "inline" } else { "attachment" };
    format!("{kind}; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}
