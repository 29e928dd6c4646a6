use axum::{
    extract::Request,
    http::{HeaderValue, header::HeaderName},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied id that is echoed back instead of replaced.
const MAX_FORWARDED_ID_LEN: usize = 128;

/// Tag every request with an id so worker logs and scratch cleanup warnings
/// can be tied back to the upload that caused them.
///
/// A well-formed incoming `x-request-id` is kept; otherwise a fresh UUID is
/// generated. The id is recorded on the current span, stored in request
/// extensions as [`RequestId`], and echoed on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= MAX_FORWARDED_ID_LEN)
        .map(str::to_string)
        .map(RequestId)
        .unwrap_or_else(|| RequestId(Uuid::new_v4().to_string()));

    tracing::Span::current().record("request_id", request_id.as_str());
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
