use std::time::Instant;

use axum::{
    extract::{Multipart, State},
    response::Json as ResponseJson,
};
use board::Grid;
use executors::WorkerFailure;

use crate::{AppState, error::ApiError, routes::read_upload};

/// Run the recognition worker on an uploaded board photo and return the
/// board it produced.
pub async fn recognize_board(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ResponseJson<Grid>, ApiError> {
    let upload = read_upload(&mut multipart, "image")
        .await?
        .ok_or_else(|| ApiError::BadRequest("No image file uploaded.".to_string()))?;

    let extension = upload.extension().unwrap_or_else(|| "png".to_string());
    let image = state
        .scratch()
        .write("upload", &extension, &upload.bytes)
        .await?;
    tracing::info!(
        "Recognizing {} ({} bytes)",
        upload.file_name.as_deref().unwrap_or("unnamed upload"),
        upload.bytes.len()
    );

    let started = Instant::now();
    let output = {
        let _permit = state.acquire_job().await?;
        state
            .gateway()
            .invoke(state.config().workers.recognize.recognize(image.path()))
            .await?
    };

    let grid = output.into_grid().ok_or_else(|| WorkerFailure::MalformedOutput {
        reason: "recognizer reported a file instead of board JSON".to_string(),
        raw: String::new(),
    })?;
    tracing::info!(
        "Recognized {} floors in {}ms",
        grid.data.len(),
        started.elapsed().as_millis()
    );
    Ok(ResponseJson(grid))
}
