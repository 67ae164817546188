use crate::{
    documents::ExportedDocument,
    services::{
        invoicing::{InvoiceFilter, InvoiceView, IssuedInvoice},
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
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({ "load_sheet_id": 42 }))]
pub struct CreateInvoiceRequest {
    pub load_sheet_id: i32,
    /// Backdated issue; the number comes from this date's month. Defaults to today.
    pub invoice_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({ "email_address": "accounts@client.co.za" }))]
pub struct EmailRequest {
    pub email_address: String,
}

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/:id", get(get_invoice))
        .route("/:id/paid", post(mark_invoice_paid))
        .route("/:id/email", post(send_invoice_email))
        .route("/:id/document", post(export_invoice_document))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(InvoiceFilter, Pagination),
    responses(
        (status = 200, description = "Invoices, newest first", body = ApiResponse<PaginatedResponse<InvoiceView>>)
    ),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<PaginatedResponse<InvoiceView>> {
    let page = state
        .services
        .invoicing
        .list_invoices(filter, state.clamp(pagination))
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 200, description = "Invoice issued", body = ApiResponse<IssuedInvoice>),
        (status = 400, description = "Load sheet not completed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Load sheet not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Load sheet already invoiced", body = crate::errors::ErrorResponse),
        (status = 422, description = "Monthly invoice sequence exhausted", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> ApiResult<IssuedInvoice> {
    let invoicing = &state.services.invoicing;
    let issued = match payload.invoice_date {
        Some(date) => invoicing.issue_invoice_on(payload.load_sheet_id, date).await?,
        None => invoicing.create_invoice(payload.load_sheet_id).await?,
    };
    Ok(Json(ApiResponse::success(issued)))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice fetched", body = ApiResponse<InvoiceView>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices"
)]
pub async fn get_invoice(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<InvoiceView> {
    let invoice = state.services.invoicing.get_invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/paid",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice marked paid", body = ApiResponse<InvoiceView>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices"
)]
pub async fn mark_invoice_paid(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<InvoiceView> {
    let invoice = state.services.invoicing.mark_invoice_paid(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/email",
    params(("id" = i32, Path, description = "Invoice ID")),
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Invoice emailed", body = ApiResponse<InvoiceView>),
        (status = 400, description = "Malformed email address", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Mail transport failed; retry later", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices"
)]
pub async fn send_invoice_email(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<EmailRequest>,
) -> ApiResult<InvoiceView> {
    let invoice = state
        .services
        .invoicing
        .send_invoice_email(id, &payload.email_address)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/document",
    params(("id" = i32, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Document exported", body = ApiResponse<ExportedDocument>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Export failed", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices"
)]
pub async fn export_invoice_document(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<ExportedDocument> {
    let document = state.services.invoicing.export_invoice(id).await?;
    Ok(Json(ApiResponse::success(document)))
}
