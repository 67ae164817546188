use crate::{
    entities::contractor, handlers::companies::SetStatusRequest,
    services::contractors::ContractorInput, ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContractorListQuery {
    /// Include inactive contractors.
    #[serde(default)]
    pub include_inactive: bool,
}

pub fn contractor_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contractors).post(create_contractor))
        .route("/:id", get(get_contractor))
        .route("/:id/status", post(set_contractor_status))
}

#[utoipa::path(
    get,
    path = "/api/v1/contractors",
    params(ContractorListQuery),
    responses(
        (status = 200, description = "Contractors ordered by name", body = ApiResponse<Vec<contractor::Model>>)
    ),
    tag = "contractors"
)]
pub async fn list_contractors(
    State(state): State<AppState>,
    Query(query): Query<ContractorListQuery>,
) -> ApiResult<Vec<contractor::Model>> {
    let contractors = state
        .services
        .contractors
        .list_contractors(query.include_inactive)
        .await?;
    Ok(Json(ApiResponse::success(contractors)))
}

#[utoipa::path(
    post,
    path = "/api/v1/contractors",
    request_body = ContractorInput,
    responses(
        (status = 200, description = "Contractor created", body = ApiResponse<contractor::Model>),
        (status = 400, description = "Invalid contractor", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate contractor name", body = crate::errors::ErrorResponse)
    ),
    tag = "contractors"
)]
pub async fn create_contractor(
    State(state): State<AppState>,
    Json(payload): Json<ContractorInput>,
) -> ApiResult<contractor::Model> {
    let created = state.services.contractors.create_contractor(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/contractors/{id}",
    params(("id" = i32, Path, description = "Contractor ID")),
    responses(
        (status = 200, description = "Contractor", body = ApiResponse<contractor::Model>),
        (status = 404, description = "Contractor not found", body = crate::errors::ErrorResponse)
    ),
    tag = "contractors"
)]
pub async fn get_contractor(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<contractor::Model> {
    let found = state.services.contractors.get_contractor(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    post,
    path = "/api/v1/contractors/{id}/status",
    params(("id" = i32, Path, description = "Contractor ID")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<contractor::Model>),
        (status = 404, description = "Contractor not found", body = crate::errors::ErrorResponse)
    ),
    tag = "contractors"
)]
pub async fn set_contractor_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<SetStatusRequest>,
) -> ApiResult<contractor::Model> {
    let updated = state
        .services
        .contractors
        .set_status(id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}
