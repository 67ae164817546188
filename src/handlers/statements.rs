use crate::{
    documents::ExportedDocument,
    handlers::invoices::EmailRequest,
    services::{
        statements::{
            GeneratedStatement, StatementDetails, StatementFilter, StatementPeriod, StatementView,
        },
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
#[schema(example = json!({ "company_id": 3, "period": "2025-06" }))]
pub struct GenerateStatementRequest {
    pub company_id: i32,
    /// `YYYY-MM` or `YYYYMM`
    pub period: String,
}

pub fn statement_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_statements).post(generate_statement))
        .route("/:id", get(get_statement))
        .route("/:id/email", post(send_statement_email))
        .route("/:id/document", post(export_statement_document))
}

#[utoipa::path(
    get,
    path = "/api/v1/statements",
    params(StatementFilter, Pagination),
    responses(
        (status = 200, description = "Statements, newest period first", body = ApiResponse<PaginatedResponse<StatementView>>)
    ),
    tag = "statements"
)]
pub async fn list_statements(
    State(state): State<AppState>,
    Query(filter): Query<StatementFilter>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<PaginatedResponse<StatementView>> {
    let page = state
        .services
        .statements
        .list_statements(filter, state.clamp(pagination))
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/statements",
    request_body = GenerateStatementRequest,
    responses(
        (status = 200, description = "Statement generated", body = ApiResponse<GeneratedStatement>),
        (status = 400, description = "Malformed period", body = crate::errors::ErrorResponse),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Statement already exists for the period", body = crate::errors::ErrorResponse),
        (status = 422, description = "No invoices in the period", body = crate::errors::ErrorResponse)
    ),
    tag = "statements"
)]
pub async fn generate_statement(
    State(state): State<AppState>,
    Json(payload): Json<GenerateStatementRequest>,
) -> ApiResult<GeneratedStatement> {
    let period: StatementPeriod = payload.period.parse()?;
    let generated = state
        .services
        .statements
        .generate_statement(payload.company_id, period)
        .await?;
    Ok(Json(ApiResponse::success(generated)))
}

#[utoipa::path(
    get,
    path = "/api/v1/statements/{id}",
    params(("id" = i32, Path, description = "Statement ID")),
    responses(
        (status = 200, description = "Statement with item snapshots", body = ApiResponse<StatementDetails>),
        (status = 404, description = "Statement not found", body = crate::errors::ErrorResponse)
    ),
    tag = "statements"
)]
pub async fn get_statement(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<StatementDetails> {
    let details = state.services.statements.get_statement_details(id).await?;
    Ok(Json(ApiResponse::success(details)))
}

#[utoipa::path(
    post,
    path = "/api/v1/statements/{id}/email",
    params(("id" = i32, Path, description = "Statement ID")),
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Statement emailed", body = ApiResponse<StatementView>),
        (status = 400, description = "Malformed email address", body = crate::errors::ErrorResponse),
        (status = 404, description = "Statement not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Mail transport failed; retry later", body = crate::errors::ErrorResponse)
    ),
    tag = "statements"
)]
pub async fn send_statement_email(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<EmailRequest>,
) -> ApiResult<StatementView> {
    let statement = state
        .services
        .statements
        .send_statement_email(id, &payload.email_address)
        .await?;
    Ok(Json(ApiResponse::success(statement)))
}

#[utoipa::path(
    post,
    path = "/api/v1/statements/{id}/document",
    params(("id" = i32, Path, description = "Statement ID")),
    responses(
        (status = 200, description = "Document exported", body = ApiResponse<ExportedDocument>),
        (status = 404, description = "Statement not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Export failed", body = crate::errors::ErrorResponse)
    ),
    tag = "statements"
)]
pub async fn export_statement_document(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<ExportedDocument> {
    let document = state.services.statements.export_statement(id).await?;
    Ok(Json(ApiResponse::success(document)))
}
