use crate::{
    services::{
        load_sheets::{LoadSheetChanges, LoadSheetFilter, LoadSheetView, NewLoadSheet},
        Pagination,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};

pub fn load_sheet_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_load_sheets).post(create_load_sheet))
        .route("/:id", get(get_load_sheet).put(update_load_sheet))
}

#[utoipa::path(
    get,
    path = "/api/v1/load-sheets",
    params(LoadSheetFilter, Pagination),
    responses(
        (status = 200, description = "Load sheets, newest first", body = ApiResponse<PaginatedResponse<LoadSheetView>>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "load-sheets"
)]
pub async fn list_load_sheets(
    State(state): State<AppState>,
    Query(filter): Query<LoadSheetFilter>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<PaginatedResponse<LoadSheetView>> {
    let page = state
        .services
        .load_sheets
        .list_load_sheets(filter, state.clamp(pagination))
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/load-sheets",
    request_body = NewLoadSheet,
    responses(
        (status = 200, description = "Load sheet created", body = ApiResponse<LoadSheetView>),
        (status = 400, description = "Invalid load sheet", body = crate::errors::ErrorResponse),
        (status = 404, description = "Company or contractor not found", body = crate::errors::ErrorResponse)
    ),
    tag = "load-sheets"
)]
pub async fn create_load_sheet(
    State(state): State<AppState>,
    Json(payload): Json<NewLoadSheet>,
) -> ApiResult<LoadSheetView> {
    let created = state.services.load_sheets.create_load_sheet(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/load-sheets/{id}",
    params(("id" = i32, Path, description = "Load sheet ID")),
    responses(
        (status = 200, description = "Load sheet fetched", body = ApiResponse<LoadSheetView>),
        (status = 404, description = "Load sheet not found", body = crate::errors::ErrorResponse)
    ),
    tag = "load-sheets"
)]
pub async fn get_load_sheet(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<LoadSheetView> {
    let sheet = state.services.load_sheets.get_load_sheet(id).await?;
    Ok(Json(ApiResponse::success(sheet)))
}

#[utoipa::path(
    put,
    path = "/api/v1/load-sheets/{id}",
    params(("id" = i32, Path, description = "Load sheet ID")),
    request_body = LoadSheetChanges,
    responses(
        (status = 200, description = "Load sheet updated", body = ApiResponse<LoadSheetView>),
        (status = 400, description = "Invalid change or backward status move", body = crate::errors::ErrorResponse),
        (status = 404, description = "Load sheet not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Pricing is frozen after invoicing", body = crate::errors::ErrorResponse)
    ),
    tag = "load-sheets"
)]
pub async fn update_load_sheet(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<LoadSheetChanges>,
) -> ApiResult<LoadSheetView> {
    let updated = state
        .services
        .load_sheets
        .update_load_sheet(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}
