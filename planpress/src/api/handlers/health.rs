use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /health/ - liveness only, no dependency checks
#[utoipa::path(
    get,
    path = "/health/",
    tag = "health",
    responses((status = 200, description = "Service is alive", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{StubCompiler, create_test_app};

    #[tokio::test]
    async fn health_reports_healthy() {
        let ctx = create_test_app(StubCompiler::Succeed).await;

        let response = ctx.server.get("/health/").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "status": "healthy" }));
    }
}
