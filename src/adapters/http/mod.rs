//! HTTP inbound adapter.
//!
//! Accepts uploads, answers status queries, streams job events and hands out the
//! rendered videos.

mod files;
mod jobs;
mod upload;

use crate::application::registry::JobRegistry;
use axum::{
    extract::DefaultBodyLimit,
    response::Html,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub use upload::media_kind;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub default_model: String,
    pub status_log_tail: usize,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let videos = ServeDir::new(&state.output_dir);

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload::upload_media))
        .route("/status/:id", get(jobs::job_status))
        .route("/events/:id", get(jobs::job_events))
        .route("/download/:file", get(files::download_video))
        .nest_service("/serve_video", videos)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
        <!doctype html>
        <html>
            <head>
                <title>Lyrics video</title>
            </head>
            <body>
                <h1>Make a lyrics video</h1>
                <form action="/upload" method="post" enctype="multipart/form-data">
                    <div>
                        <label>
                            Audio or video file:
                            <input type="file" name="file" accept=".mp4,.mov,.avi,.mkv,.mp3,.wav,.m4a,.flac,.webm">
                        </label>
                    </div>
                    <div>
                        <label>
                            Model:
                            <select name="model">
                                <option value="tiny.en">tiny.en</option>
                                <option value="base.en">base.en</option>
                                <option value="small.en">small.en</option>
                                <option value="medium.en" selected>medium.en</option>
                            </select>
                        </label>
                    </div>
                    <div>
                        <label><input type="checkbox" name="wipe_text"> Karaoke word wipe</label>
                    </div>
                    <div>
                        <label><input type="checkbox" name="separate_vocals"> Isolate vocals first</label>
                    </div>
                    <div>
                        <input type="submit" value="Upload">
                    </div>
                </form>
            </body>
        </html>
        "#,
    )
}
