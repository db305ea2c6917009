use super::upload::path_is_valid;
use super::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

/// Rendered video as an attachment.
pub async fn download_video(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    if !path_is_valid(&PathBuf::from(&file)) {
        return Err((StatusCode::BAD_REQUEST, "Invalid path".to_string()));
    }
    let path = state.output_dir.join(&file);
    let handle = tokio::fs::File::open(&path)
        .await
        .map_err(|_| (StatusCode::NOT_FOUND, "File not found".to_string()))?;

    let body = Body::from_stream(ReaderStream::new(handle));
    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.replace('"', "")),
            ),
        ],
        body,
    )
        .into_response())
}
