use crate::{services::dashboard::DashboardSummary, ApiResponse, ApiResult, AppState};
use axum::{extract::State, response::Json};

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Billing overview as of today", body = ApiResponse<DashboardSummary>)
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    let summary = state.services.dashboard.summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}
