use std::time::Instant;

use axum::{
    extract::{Multipart, State},
    response::Response,
};
use executors::WorkerCommand;
use services::services::spreadsheet::{
    SpreadsheetError, convert_to_floor_unit, is_spreadsheet_container,
};

use crate::{
    AppState,
    error::ApiError,
    routes::{Upload, read_upload, run_blocking, xlsx_download},
};

/// Re-lay an uploaded basic-layout workbook as a floor-unit workbook.
pub async fn convert_workbook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(&mut multipart, "excel")
        .await?
        .ok_or_else(|| ApiError::BadRequest("No Excel file uploaded.".to_string()))?;
    if !is_spreadsheet_container(&upload.bytes) {
        return Err(SpreadsheetError::NotSpreadsheet.into());
    }

    let started = Instant::now();
    let name = converted_name(&upload);
    let input_len = upload.bytes.len();
    let bytes = {
        let _permit = state.acquire_job().await?;
        match state.config().workers.convert.as_ref() {
            Some(worker) => convert_with_worker(&state, worker, &upload).await?,
            None => {
                let input = upload.bytes.clone();
                run_blocking(move || convert_to_floor_unit(&input)).await?
            }
        }
    };

    tracing::info!(
        "Converted workbook ({} -> {} bytes) in {}ms",
        input_len,
        bytes.len(),
        started.elapsed().as_millis()
    );
    Ok(xlsx_download(bytes, &name))
}

async fn convert_with_worker(
    state: &AppState,
    worker: &WorkerCommand,
    upload: &Upload,
) -> Result<Vec<u8>, ApiError> {
    let input = state
        .scratch()
        .write("converted", "xlsx", &upload.bytes)
        .await?;
    let output = state.scratch().reserve("converted", "xlsx");
    state
        .gateway()
        .invoke(worker.convert(input.path(), output.path()))
        .await?;
    Ok(output.read().await?)
}

/// `{stem}_변환.xlsx` from the client file name, keeping only characters
/// that are safe in a file name.
fn converted_name(upload: &Upload) -> String {
    let stem = upload
        .file_name
        .as_deref()
        .map(|name| {
            let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
            base.rsplit_once('.').map_or(base, |(stem, _)| stem)
        })
        .map(|stem| {
            stem.chars()
                .filter(|c| !c.is_control() && !matches!(c, '"' | ':' | '*' | '?' | '<' | '>' | '|'))
                .collect::<String>()
        })
        .map(|stem| stem.trim().to_string())
        .filter(|stem| !stem.is_empty() && stem != "." && stem != "..")
        .unwrap_or_else(|| "converted".to_string());
    format!("{stem}_변환.xlsx")
}
