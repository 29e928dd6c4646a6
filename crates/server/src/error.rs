use axum::{
    Json,
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use executors::{FailureKind, WorkerFailure};
use services::services::spreadsheet::SpreadsheetError;
use thiserror::Error;
use utils::{response::ApiResponse, scratch::ScratchError};

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Worker(#[from] WorkerFailure),
    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),
    #[error(transparent)]
    Scratch(#[from] ScratchError),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Worker(failure) => match (failure.kind(), failure) {
                (_, WorkerFailure::TimedOut { .. }) => {
                    (StatusCode::GATEWAY_TIMEOUT, "WorkerTimedOut")
                }
                (FailureKind::Launch, _) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "WorkerLaunchError")
                }
                (FailureKind::Execution, _) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "WorkerExecutionError")
                }
                (FailureKind::Protocol, _) => (StatusCode::BAD_GATEWAY, "WorkerProtocolError"),
            },
            ApiError::Spreadsheet(err) if err.is_input_error() => {
                (StatusCode::BAD_REQUEST, "InvalidSpreadsheet")
            }
            ApiError::Spreadsheet(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SpreadsheetError"),
            ApiError::Scratch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ScratchError"),
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, "MultipartError"),
            ApiError::Json(_) => (StatusCode::BAD_REQUEST, "InvalidBoardJson"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status();

        let error_message = match &self {
            ApiError::Spreadsheet(SpreadsheetError::EmptyGrid) => {
                "No board data to export.".to_string()
            }
            ApiError::Spreadsheet(SpreadsheetError::NotSpreadsheet) => {
                "Uploaded file is not an .xlsx workbook.".to_string()
            }
            ApiError::Multipart(_) => {
                "Failed to upload file. Please ensure the file is valid and try again.".to_string()
            }
            ApiError::Json(rejection) => rejection.body_text(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::InternalError(msg) => msg.clone(),
            _ => format!("{}: {}", error_type, self),
        };

        if let ApiError::Worker(failure) = &self {
            tracing::error!(
                "{} ({} failure): {}",
                error_type,
                failure.kind().as_str(),
                self
            );
        } else if status_code.is_server_error() {
            tracing::error!("{}: {}", error_type, self);
        } else {
            tracing::debug!("Rejected request: {}", error_message);
        }

        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use super::*;

    #[test]
    fn test_worker_failure_statuses() {
        let launch: ApiError = WorkerFailure::Launch {
            program: "python3".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        }
        .into();
        assert_eq!(launch.status().0, StatusCode::INTERNAL_SERVER_ERROR);

        let timed_out: ApiError = WorkerFailure::TimedOut {
            after: Duration::from_secs(300),
            stderr: String::new(),
        }
        .into();
        assert_eq!(timed_out.status().0, StatusCode::GATEWAY_TIMEOUT);

        let malformed: ApiError = WorkerFailure::MalformedOutput {
            reason: "EOF".into(),
            raw: String::new(),
        }
        .into();
        assert_eq!(malformed.status().0, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_spreadsheet_input_errors_are_client_errors() {
        let empty: ApiError = SpreadsheetError::EmptyGrid.into();
        assert_eq!(empty.status().0, StatusCode::BAD_REQUEST);
        let too_large: ApiError = SpreadsheetError::TooLarge("columns").into();
        assert_eq!(too_large.status().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
