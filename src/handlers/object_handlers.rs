//! HTTP handlers for uploads, media serving and deletion.
//! Streams upload bodies straight to disk and delegates storage concerns to
//! `StorageService`.

use crate::{
    errors::AppError,
    models::responses::{OkResponse, UploadResponse},
    services::storage_service::StorageService,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Request, State, multipart::MultipartRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use std::{io, path::Path as FsPath};
use tokio::fs;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Header carrying the shared delete secret.
pub const BACKEND_SECRET_HEADER: &str = "x-backend-secret";

/// Objects are never rewritten in place, so clients may cache them forever.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Multipart field that carries the uploaded file.
const FILE_FIELD: &str = "file";

/// `POST /uploads`: store the `file` field and derive its thumbnail.
pub async fn upload_object(
    State(service): State<StorageService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let stream = field.map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));
        let outcome = service.ingest(file_name.as_deref(), stream).await?;

        let object = &outcome.object;
        let thumb_url = outcome
            .thumbnail
            .as_ref()
            .ok()
            .map(|thumb| service.public_url(thumb));

        return Ok(Json(UploadResponse {
            ok: true,
            url: service.public_url(&object.file_name()),
            thumb_url,
            key: object.key(),
            content_type: outcome.content_type,
        }));
    }

    Err(AppError::bad_request("missing_file"))
}

/// `GET|HEAD /media/{*reference}`: stream a stored object.
///
/// Conditional and range handling (Last-Modified, If-Modified-Since, Range)
/// comes from `ServeFile`; the content type and cache policy are ours.
pub async fn serve_media(
    State(service): State<StorageService>,
    Path(reference): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let path = service.media_path(&reference)?;

    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(AppError::not_found()),
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(reference = %reference, error = %err, "media lookup failed");
            }
            return Err(AppError::not_found());
        }
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return Err(AppError::not_found());
    }

    let mut response = response.map(Body::new);
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        set_media_headers(response.headers_mut(), &path);
    }

    Ok(response)
}

/// `DELETE /uploads/{*reference}`: remove a stored object.
pub async fn delete_object(
    State(service): State<StorageService>,
    Path(reference): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, AppError> {
    let secret = headers
        .get(BACKEND_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    service.delete_object(&reference, secret).await?;
    Ok(Json(OkResponse::ok()))
}

/// Content type by extension; anything unknown is served as octet-stream.
pub fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn set_media_headers(headers: &mut HeaderMap, path: &FsPath) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(path)),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL),
    );
}
