use std::time::Instant;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Response,
};
use board::{Grid, NormalizedInput};
use executors::WorkerCommand;
use services::services::spreadsheet::{
    CellTextSource, SpreadsheetError, encode_basic, encode_floor_unit,
};

use crate::{
    AppState,
    config::WorkerConfig,
    error::ApiError,
    routes::{download_timestamp, run_blocking, xlsx_download},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Basic,
    FloorUnit,
}

impl Layout {
    fn scratch_prefix(self) -> &'static str {
        match self {
            Layout::Basic => "basic_excel",
            Layout::FloorUnit => "floor_unit",
        }
    }

    fn worker(self, workers: &WorkerConfig) -> Option<&WorkerCommand> {
        match self {
            Layout::Basic => workers.basic_export.as_ref(),
            Layout::FloorUnit => workers.floor_unit_export.as_ref(),
        }
    }

    fn download_name(self) -> String {
        match self {
            Layout::Basic => format!("현황표_{}.xlsx", download_timestamp()),
            Layout::FloorUnit => format!("층호수형태_{}.xlsx", download_timestamp()),
        }
    }
}

pub async fn download_basic(
    State(state): State<AppState>,
    payload: Result<Json<NormalizedInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = payload?;
    export(&state, Grid::from(input), Layout::Basic).await
}

pub async fn download_floor_unit(
    State(state): State<AppState>,
    payload: Result<Json<NormalizedInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = payload?;
    export(&state, Grid::from(input), Layout::FloorUnit).await
}

async fn export(state: &AppState, grid: Grid, layout: Layout) -> Result<Response, ApiError> {
    if grid.is_empty() {
        return Err(SpreadsheetError::EmptyGrid.into());
    }
    let started = Instant::now();
    let floors = grid.data.len();

    let bytes = {
        let _permit = state.acquire_job().await?;
        match layout.worker(&state.config().workers) {
            Some(worker) => render_with_worker(state, worker, &grid, layout).await?,
            None => {
                run_blocking(move || match layout {
                    Layout::Basic => encode_basic(&grid),
                    Layout::FloorUnit => encode_floor_unit(&grid, CellTextSource::CellText),
                })
                .await?
            }
        }
    };

    tracing::info!(
        "Exported {:?} workbook: {} floors, {} bytes in {}ms",
        layout,
        floors,
        bytes.len(),
        started.elapsed().as_millis()
    );
    Ok(xlsx_download(bytes, &layout.download_name()))
}

async fn render_with_worker(
    state: &AppState,
    worker: &WorkerCommand,
    grid: &Grid,
    layout: Layout,
) -> Result<Vec<u8>, ApiError> {
    let payload = serde_json::to_string(grid)
        .map_err(|e| ApiError::InternalError(format!("failed to serialize board: {e}")))?;
    state.scratch().ensure().await?;
    let output = state.scratch().reserve(layout.scratch_prefix(), "xlsx");
    state
        .gateway()
        .invoke(worker.generate(&payload, output.path()))
        .await?;
    Ok(output.read().await?)
}
