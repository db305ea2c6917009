use super::AppState;
use crate::application::registry::Submission;
use crate::domain::captions::CaptionMode;
use crate::domain::jobs::JobOptions;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
    BoxError,
};
use futures::{Stream, TryStreamExt};
use serde::Serialize;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::StreamReader;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];
const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "wav", "m4a", "flac", "webm"];

/// Recordings made in the browser arrive under this field, always as webm audio.
const RECORDING_FIELD: &str = "audio_blob";
const FILE_FIELD: &str = "file";

/// Whether an extension is accepted, and as what kind of input.
pub fn media_kind(extension: &str) -> Option<bool> {
    let extension = extension.to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Some(true)
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub status: &'static str,
}

struct StoredMedia {
    path: PathBuf,
    original_name: String,
    is_video: bool,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

/// Keeps the status multer chose, so a body over the limit answers 413.
fn multipart_error(err: MultipartError) -> (StatusCode, String) {
    (err.status(), err.body_text())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "could not remove rejected upload");
    }
}

#[derive(Default)]
struct UploadForm {
    model: Option<String>,
    wipe_text: bool,
    separate_vocals: bool,
}

/// Accepts one media file plus form options and starts a job for it.
pub async fn upload_media(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    let mut media: Option<StoredMedia> = None;
    let form = match read_form(&state, &mut multipart, &mut media).await {
        Ok(form) => form,
        Err(rejection) => {
            // No job will ever own a file stored before the rejection
            if let Some(stored) = media {
                discard(&stored.path).await;
            }
            return Err(rejection);
        }
    };

    let media = media.ok_or_else(|| bad_request("No file part"))?;
    let options = JobOptions {
        model: form.model.unwrap_or_else(|| state.default_model.clone()),
        caption_mode: if form.wipe_text {
            CaptionMode::Karaoke
        } else {
            CaptionMode::Phrase
        },
        isolate_vocals: form.separate_vocals,
        is_video: media.is_video,
    };

    let id = state
        .registry
        .submit(Submission {
            input: media.path,
            original_name: media.original_name,
            options,
        })
        .await;

    Ok(Json(UploadResponse {
        job_id: id.to_string(),
        status: "processing_started",
    }))
}

async fn read_form(
    state: &AppState,
    multipart: &mut Multipart,
    media: &mut Option<StoredMedia>,
) -> Result<UploadForm, (StatusCode, String)> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "model" => {
                let value = field.text().await.map_err(multipart_error)?;
                let value = value.trim();
                if !value.is_empty() {
                    form.model = Some(value.to_string());
                }
            }
            "wipe_text" => {
                form.wipe_text = field.text().await.map_err(multipart_error)? == "on";
            }
            "separate_vocals" => {
                form.separate_vocals = field.text().await.map_err(multipart_error)? == "on";
            }
            FILE_FIELD | RECORDING_FIELD if media.is_none() => {
                let (original_name, extension, is_video) = if name == RECORDING_FIELD {
                    ("recording.webm".to_string(), "webm".to_string(), false)
                } else {
                    let file_name = field
                        .file_name()
                        .map(|n| {
                            Path::new(n)
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default()
                        })
                        .unwrap_or_default();
                    if file_name.is_empty() {
                        return Err(bad_request("No selected file"));
                    }
                    let extension = Path::new(&file_name)
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .unwrap_or("")
                        .to_ascii_lowercase();
                    let is_video =
                        media_kind(&extension).ok_or_else(|| bad_request("File type not allowed"))?;
                    (file_name, extension, is_video)
                };

                let stored_name = PathBuf::from(format!("{}.{extension}", uuid::Uuid::new_v4()));
                if !path_is_valid(&stored_name) {
                    return Err(bad_request("Invalid path"));
                }
                tokio::fs::create_dir_all(&state.upload_dir)
                    .await
                    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
                let path = state.upload_dir.join(stored_name);
                tracing::info!(path = %path.display(), original = %original_name, "saving upload");
                stream_to_file(&path, field).await?;

                *media = Some(StoredMedia {
                    path,
                    original_name,
                    is_video,
                });
            }
            _ => continue,
        }
    }

    Ok(form)
}

// Save a `Stream` to a file, removing whatever was written if the stream fails
pub(crate) async fn stream_to_file<S, E>(path: &PathBuf, stream: S) -> Result<(), (StatusCode, String)>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let copied = async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;

        Ok::<_, io::Error>(())
    }
    .await;

    match copied {
        Ok(()) => Ok(()),
        Err(err) => {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                discard(path).await;
            }
            Err(stream_error(err))
        }
    }
}

fn stream_error(err: io::Error) -> (StatusCode, String) {
    let status = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
        .map_or(StatusCode::INTERNAL_SERVER_ERROR, MultipartError::status);
    (status, err.to_string())
}

/// A single plain file name, nothing that could climb out of the served directory.
pub(crate) fn path_is_valid(path: &Path) -> bool {
    let mut components = path.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
