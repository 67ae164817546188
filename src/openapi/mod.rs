use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Logistix API",
        version = "1.0.0",
        description = r#"
# Logistix Billing API

Back office for a pallet haulage business: customer companies, load sheets,
VAT invoices and monthly statements of account.

## Workflow

1. Register a **company** with its default rate per pallet and payment terms.
2. Record a **load sheet** for every job and move it through
   `pending -> in_progress -> completed`.
3. Issue an **invoice** for a completed load sheet. Invoice numbers follow
   `INVYYYYMMNNN` and restart every month.
4. Generate a monthly **statement** per company. Opening balances carry
   forward from the previous month's closing balance.

Invoices and statements can be exported as HTML documents (served under
`/uploads`) and emailed to the customer.

## Error Handling

Errors share one envelope:

```json
{
  "success": false,
  "error": "Conflict",
  "message": "Conflict: Load sheet 12 has already been invoiced",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-06-09T10:30:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, capped
by `api_max_page_size`).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "companies", description = "Customer companies"),
        (name = "contractors", description = "Subcontracted hauliers"),
        (name = "load-sheets", description = "Jobs to be billed"),
        (name = "invoices", description = "VAT invoices and payments"),
        (name = "statements", description = "Monthly statements of account"),
        (name = "dashboard", description = "Billing overview"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Companies
        crate::handlers::companies::list_companies,
        crate::handlers::companies::create_company,
        crate::handlers::companies::get_company,
        crate::handlers::companies::update_company,
        crate::handlers::companies::set_company_status,
        crate::handlers::companies::delete_company,

        // Contractors
        crate::handlers::contractors::list_contractors,
        crate::handlers::contractors::create_contractor,
        crate::handlers::contractors::get_contractor,
        crate::handlers::contractors::set_contractor_status,

        // Load sheets
        crate::handlers::load_sheets::list_load_sheets,
        crate::handlers::load_sheets::create_load_sheet,
        crate::handlers::load_sheets::get_load_sheet,
        crate::handlers::load_sheets::update_load_sheet,

        // Invoices
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::mark_invoice_paid,
        crate::handlers::invoices::send_invoice_email,
        crate::handlers::invoices::export_invoice_document,

        // Statements
        crate::handlers::statements::list_statements,
        crate::handlers::statements::generate_statement,
        crate::handlers::statements::get_statement,
        crate::handlers::statements::send_statement_email,
        crate::handlers::statements::export_statement_document,

        // Dashboard & health
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::health::health_check,
        crate::handlers::health::api_status,
    ),
    components(
        schemas(
            // Records
            crate::entities::company::Model,
            crate::entities::contractor::Model,
            crate::entities::RecordStatus,
            crate::entities::DeliveryMethod,
            crate::entities::LoadSheetStatus,
            crate::entities::PresentedStatus,
            crate::entities::PaymentStatus,
            crate::entities::InvoiceDisplayStatus,

            // Requests
            crate::services::companies::CompanyInput,
            crate::services::contractors::ContractorInput,
            crate::services::load_sheets::NewLoadSheet,
            crate::services::load_sheets::LoadSheetChanges,
            crate::handlers::companies::SetStatusRequest,
            crate::handlers::invoices::CreateInvoiceRequest,
            crate::handlers::invoices::EmailRequest,
            crate::handlers::statements::GenerateStatementRequest,

            // Views
            crate::services::load_sheets::LoadSheetView,
            crate::services::invoicing::InvoiceView,
            crate::services::invoicing::IssuedInvoice,
            crate::services::statements::StatementView,
            crate::services::statements::StatementItemView,
            crate::services::statements::StatementDetails,
            crate::services::statements::GeneratedStatement,
            crate::services::dashboard::DashboardSummary,
            crate::documents::ExportedDocument,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::StatusResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_billing_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Logistix API"));
        assert!(json.contains("/api/v1/invoices/{id}/paid"));
        assert!(json.contains("/api/v1/statements"));
        assert!(json.contains("StatementDetails"));
    }
}
