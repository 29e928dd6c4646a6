use axum::{Json, extract::rejection::JsonRejection, response::Json as ResponseJson};
use board::{Grid, GridView, NormalizedInput};
use utils::response::ApiResponse;

use crate::error::ApiError;

/// Table projection of a board in export column order, for on-screen review
/// before downloading.
pub async fn preview_board(
    payload: Result<Json<NormalizedInput>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<GridView>>, ApiError> {
    let Json(input) = payload?;
    let grid = Grid::from(input);
    Ok(ResponseJson(ApiResponse::success(GridView::from(&grid))))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::{
        config::ServerConfig,
        routes::{router, testing},
        test_support::{FakeGateway, state_with},
    };

    #[tokio::test]
    async fn test_preview_orders_columns_and_resolves_colors() {
        let (state, _dir) = state_with(ServerConfig::default(), FakeGateway::unreachable());
        let response = router(state)
            .oneshot(testing::json_request(
                "/api/preview",
                r#"[{"floor":"1층","units":{"102":{"text":"b","color":"purple"},"101":{"text":"a","color":"yellow"}}}]"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = testing::body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["columns"], serde_json::json!(["101", "102"]));
        let cells = &body["data"]["rows"][0]["cells"];
        assert_eq!(cells[0]["color"], "YELLOW");
        assert_eq!(cells[0]["display"], "#FFFFCC");
        assert_eq!(cells[1]["color"], "WHITE");
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _dir) = state_with(ServerConfig::default(), FakeGateway::unreachable());
        let response = router(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(testing::body_json(response).await["data"], "OK");
    }
}
