use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Request},
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use services::services::spreadsheet::SpreadsheetError;
use tower_http::trace::TraceLayer;

use crate::{AppState, error::ApiError, middleware as app_middleware};

pub mod convert;
pub mod export;
pub mod health;
pub mod preview;
pub mod recognize;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config().upload_limit_bytes;

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ocr", post(recognize::recognize_board))
        .route("/preview", post(preview::preview_board))
        .route("/download-basic-excel", post(export::download_basic))
        .route(
            "/convert-data-to-floor-unit",
            post(export::download_floor_unit),
        )
        .route("/convert-excel", post(convert::convert_workbook))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(middleware::from_fn(app_middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
}

/// One uploaded file from a multipart body.
pub(crate) struct Upload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// Lower-cased extension of the client file name, if it looks sane.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        let valid = !ext.is_empty() && ext.len() <= 8 && ext.bytes().all(|b| b.is_ascii_alphanumeric());
        valid.then(|| ext.to_ascii_lowercase())
    }
}

/// The first non-empty file under `field`. Other fields are skipped.
pub(crate) async fn read_upload(
    multipart: &mut Multipart,
    field: &str,
) -> Result<Option<Upload>, ApiError> {
    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().map(str::to_string);
        let bytes = part.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Upload { file_name, bytes }));
    }
    Ok(None)
}

/// Run a CPU-bound workbook job off the async workers.
pub(crate) async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, SpreadsheetError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ApiError::InternalError(format!("workbook task failed: {e}")))?
        .map_err(ApiError::from)
}

/// `attachment` response carrying an xlsx body. The UTF-8 name goes in
/// `filename*`; `filename` gets an ASCII stand-in for older clients.
pub(crate) fn xlsx_download(bytes: Vec<u8>, file_name: &str) -> Response {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    );
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

pub(crate) fn download_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::{
        body::Body,
        http::{Request, Response, header},
    };
    use serde_json::Value;

    pub const BOUNDARY: &str = "board-test-boundary";

    pub fn multipart_request(uri: &str, field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    pub fn json_request(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    /// Decoded `filename*` of a download response.
    pub fn download_name(response: &Response<Body>) -> String {
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        let encoded = disposition.split("filename*=UTF-8''").nth(1).unwrap();
        urlencoding::decode(encoded).unwrap().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_extension() {
        let upload = |name: Option<&str>| Upload {
            file_name: name.map(str::to_string),
            bytes: Bytes::from_static(b"x"),
        };
        assert_eq!(upload(Some("scan.JPG")).extension().as_deref(), Some("jpg"));
        assert_eq!(upload(Some("archive.tar.gz")).extension().as_deref(), Some("gz"));
        assert_eq!(upload(Some("../../etc/passwd")).extension(), None);
        assert_eq!(upload(Some("no_extension")).extension(), None);
        assert_eq!(upload(None).extension(), None);
    }

    #[tokio::test]
    async fn test_download_headers() {
        let response = xlsx_download(b"PK\x03\x04".to_vec(), "현황표_1.xlsx");
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"___"));
        assert_eq!(testing::download_name(&response), "현황표_1.xlsx");
    }
}
