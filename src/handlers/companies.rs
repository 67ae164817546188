use crate::{
    entities::{company, RecordStatus},
    services::{
        companies::{CompanyFilter, CompanyInput},
        Pagination,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({ "status": "inactive" }))]
pub struct SetStatusRequest {
    pub status: RecordStatus,
}

pub fn company_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_companies).post(create_company))
        .route(
            "/:id",
            get(get_company).put(update_company).delete(delete_company),
        )
        .route("/:id/status", post(set_company_status))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies",
    params(CompanyFilter, Pagination),
    responses(
        (status = 200, description = "Companies ordered by name", body = ApiResponse<PaginatedResponse<company::Model>>)
    ),
    tag = "companies"
)]
pub async fn list_companies(
    State(state): State<AppState>,
    Query(filter): Query<CompanyFilter>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<PaginatedResponse<company::Model>> {
    let page = state
        .services
        .companies
        .list_companies(filter, state.clamp(pagination))
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies",
    request_body = CompanyInput,
    responses(
        (status = 200, description = "Company created", body = ApiResponse<company::Model>),
        (status = 400, description = "Invalid company", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate company name", body = crate::errors::ErrorResponse)
    ),
    tag = "companies"
)]
pub async fn create_company(
    State(state): State<AppState>,
    Json(payload): Json<CompanyInput>,
) -> ApiResult<company::Model> {
    let created = state.services.companies.create_company(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/{id}",
    params(("id" = i32, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Company fetched", body = ApiResponse<company::Model>),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse)
    ),
    tag = "companies"
)]
pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<company::Model> {
    let found = state.services.companies.get_company(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    put,
    path = "/api/v1/companies/{id}",
    params(("id" = i32, Path, description = "Company ID")),
    request_body = CompanyInput,
    responses(
        (status = 200, description = "Company updated", body = ApiResponse<company::Model>),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate company name", body = crate::errors::ErrorResponse)
    ),
    tag = "companies"
)]
pub async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<CompanyInput>,
) -> ApiResult<company::Model> {
    let updated = state.services.companies.update_company(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies/{id}/status",
    params(("id" = i32, Path, description = "Company ID")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<company::Model>),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse)
    ),
    tag = "companies"
)]
pub async fn set_company_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<SetStatusRequest>,
) -> ApiResult<company::Model> {
    let updated = state
        .services
        .companies
        .set_status(id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/companies/{id}",
    params(("id" = i32, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Company deleted"),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Company is active or has billing history", body = crate::errors::ErrorResponse)
    ),
    tag = "companies"
)]
pub async fn delete_company(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<()> {
    state.services.companies.delete_company(id).await?;
    Ok(Json(ApiResponse::success(())))
}
