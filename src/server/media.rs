use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

use crate::server::AppState;
use crate::server::response::ApiError;

const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpeg", "jpg", "gif", "webp"];

/// Public URL for a media-relative path stored in the database.
#[must_use]
pub fn media_url(path: &str) -> String {
    format!("/media/{path}")
}

/// Decodes a `data:image/<ext>;base64,<payload>` URI and writes it under
/// `<data_dir>/media/<subdir>/`. Returns the media-relative path to store.
pub fn save_base64_image(
    data_dir: &FsPath,
    subdir: &str,
    data_uri: &str,
) -> Result<String, ApiError> {
    let rest = data_uri
        .strip_prefix("data:image/")
        .ok_or_else(|| ApiError::bad_request("Image must be a base64 data URI"))?;
    let (ext, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ApiError::bad_request("Image must be a base64 data URI"))?;

    let ext = ext.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::bad_request(format!(
            "Unsupported image format: {ext}"
        )));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ApiError::bad_request("Invalid base64 image payload"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Image payload is empty"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::bad_request("Image payload too large"));
    }

    let file_name = format!("{}.{ext}", Uuid::new_v4());
    let dir = data_dir.join("media").join(subdir);
    std::fs::create_dir_all(&dir)
        .map_err(|_| ApiError::internal("Failed to create media directory"))?;
    std::fs::write(dir.join(&file_name), &bytes)
        .map_err(|_| ApiError::internal("Failed to write image"))?;

    Ok(format!("{subdir}/{file_name}"))
}

/// Best-effort removal of a stored media file, used when an image is replaced.
pub fn remove_media_file(data_dir: &FsPath, media_path: &str) {
    let full = data_dir.join("media").join(media_path);
    if let Err(e) = std::fs::remove_file(&full) {
        tracing::debug!("Could not remove media file {}: {e}", full.display());
    }
}

fn content_type_for(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// GET /media/{*path} — serves stored images. The path is confined to the
/// media directory; anything with a parent component is rejected.
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    let relative = PathBuf::from(&path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(ApiError::not_found("Media not found"));
    }

    let full = state.data_dir.join("media").join(&relative);
    let bytes = tokio::fs::read(&full)
        .await
        .map_err(|_| ApiError::not_found("Media not found"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        content_type_for(&full).parse().unwrap(),
    );

    Ok::<_, ApiError>((StatusCode::OK, headers, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    #[test]
    fn save_and_locate_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let data_uri = format!("data:image/png;base64,{TINY_PNG}");

        let path = save_base64_image(dir.path(), "recipes", &data_uri).unwrap();
        assert!(path.starts_with("recipes/"));
        assert!(path.ends_with(".png"));
        assert!(dir.path().join("media").join(&path).exists());
    }

    #[test]
    fn reject_non_data_uri() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(save_base64_image(dir.path(), "recipes", "http://example.com/x.png").is_err());
        assert!(save_base64_image(dir.path(), "recipes", "data:image/png;base64,!!!").is_err());
        assert!(save_base64_image(dir.path(), "recipes", "data:image/svg+xml;base64,AAA").is_err());
    }

    #[test]
    fn media_url_prefixes_path() {
        assert_eq!(media_url("recipes/a.png"), "/media/recipes/a.png");
    }
}
