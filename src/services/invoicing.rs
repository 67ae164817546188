use crate::{
    config::BillingConfig,
    documents::{DocumentExporter, DocumentRenderer, ExportedDocument, InvoiceDocument},
    entities::{company, invoice, load_sheet, InvoiceDisplayStatus, LoadSheetStatus, PaymentStatus},
    errors::{is_unique_violation, ServiceError},
    notifications::{EmailAttachment, MailTransport, OutgoingEmail},
    services::{
        billing::{apply_vat, due_date, round_currency},
        numbering::next_invoice_number,
        paginate, today, validate_recipient, Pagination,
    },
    PaginatedResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

/// Billing parameters fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingSettings {
    /// VAT percentage applied to new invoices.
    pub vat_rate: Decimal,
    pub require_completed_load_sheet: bool,
    pub invoice_number_attempts: u32,
}

impl From<&BillingConfig> for BillingSettings {
    fn from(cfg: &BillingConfig) -> Self {
        Self {
            vat_rate: cfg.vat_rate,
            require_completed_load_sheet: cfg.require_completed_load_sheet,
            invoice_number_attempts: cfg.invoice_number_attempts,
        }
    }
}

/// Result of issuing an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct IssuedInvoice {
    pub id: i32,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Absent when the export failed; the invoice itself is still valid.
    pub document: Option<ExportedDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InvoiceView {
    pub id: i32,
    pub invoice_number: String,
    pub load_sheet_id: i32,
    pub company_id: i32,
    pub company_name: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    /// Stored payment status.
    pub payment_status: PaymentStatus,
    /// `overdue` when still pending past the due date.
    pub status: InvoiceDisplayStatus,
    pub payment_date: Option<NaiveDate>,
    pub email_sent_date: Option<DateTime<Utc>>,
    pub email_sent_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InvoiceView {
    pub fn new(inv: invoice::Model, company_name: Option<String>, today: NaiveDate) -> Self {
        let status = inv.display_status(today);
        Self {
            id: inv.id,
            invoice_number: inv.invoice_number,
            load_sheet_id: inv.load_sheet_id,
            company_id: inv.company_id,
            company_name,
            invoice_date: inv.invoice_date,
            due_date: inv.due_date,
            subtotal: round_currency(inv.subtotal),
            vat_rate: inv.vat_rate,
            vat_amount: round_currency(inv.vat_amount),
            total_amount: round_currency(inv.total_amount),
            payment_status: inv.payment_status,
            status,
            payment_date: inv.payment_date,
            email_sent_date: inv.email_sent_date,
            email_sent_to: inv.email_sent_to,
            created_at: inv.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilter {
    pub company_id: Option<i32>,
    /// `pending`, `paid` or `overdue`.
    pub status: Option<InvoiceDisplayStatus>,
}

/// Issues invoices from load sheets and handles payment and delivery.
#[derive(Clone)]
pub struct InvoicingService {
    db: Arc<DatabaseConnection>,
    renderer: Arc<DocumentRenderer>,
    exporter: Arc<dyn DocumentExporter>,
    mailer: Arc<dyn MailTransport>,
    settings: BillingSettings,
}

impl InvoicingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        renderer: Arc<DocumentRenderer>,
        exporter: Arc<dyn DocumentExporter>,
        mailer: Arc<dyn MailTransport>,
        settings: BillingSettings,
    ) -> Self {
        Self {
            db,
            renderer,
            exporter,
            mailer,
            settings,
        }
    }

    pub fn settings(&self) -> BillingSettings {
        self.settings
    }

    /// Issues an invoice dated today.
    pub async fn create_invoice(&self, load_sheet_id: i32) -> Result<IssuedInvoice, ServiceError> {
        self.issue_invoice_on(load_sheet_id, today()).await
    }

    /// Issues an invoice with an explicit date. The number is allocated in the
    /// invoice date's month.
    #[instrument(skip(self))]
    pub async fn issue_invoice_on(
        &self,
        load_sheet_id: i32,
        invoice_date: NaiveDate,
    ) -> Result<IssuedInvoice, ServiceError> {
        let db = &*self.db;

        let (sheet, company) = load_sheet::Entity::find_by_id(load_sheet_id)
            .find_also_related(company::Entity)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Load sheet {} not found", load_sheet_id)))?;
        let company = company.ok_or_else(|| {
            ServiceError::NotFound(format!("Company for load sheet {} not found", load_sheet_id))
        })?;

        if self.invoice_for_load_sheet(load_sheet_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Load sheet {} has already been invoiced",
                load_sheet_id
            )));
        }

        if self.settings.require_completed_load_sheet && sheet.status != LoadSheetStatus::Completed {
            return Err(ServiceError::InvalidStatus(format!(
                "Load sheet {} is {}; only completed load sheets can be invoiced",
                load_sheet_id,
                sheet.status.presented()
            )));
        }

        let subtotal = round_currency(sheet.final_rate);
        let vat = apply_vat(subtotal, self.settings.vat_rate)?;
        let due = due_date(invoice_date, company.payment_terms);

        let attempts = self.settings.invoice_number_attempts.max(1);
        let mut issued = None;
        for attempt in 1..=attempts {
            let invoice_number = next_invoice_number(db, invoice_date).await?;

            let model = invoice::ActiveModel {
                load_sheet_id: Set(sheet.id),
                company_id: Set(company.id),
                invoice_number: Set(invoice_number.clone()),
                invoice_date: Set(invoice_date),
                due_date: Set(due),
                subtotal: Set(subtotal),
                vat_rate: Set(self.settings.vat_rate),
                vat_amount: Set(vat.vat_amount),
                total_amount: Set(vat.total),
                payment_status: Set(PaymentStatus::Pending),
                payment_date: Set(None),
                email_sent_date: Set(None),
                email_sent_to: Set(None),
                created_at: Set(Utc::now()),
                ..Default::default()
            };

            match model.insert(db).await {
                Ok(created) => {
                    issued = Some(created);
                    break;
                }
                Err(err) if is_unique_violation(&err) => {
                    if self.invoice_for_load_sheet(load_sheet_id).await?.is_some() {
                        return Err(ServiceError::Conflict(format!(
                            "Load sheet {} has already been invoiced",
                            load_sheet_id
                        )));
                    }
                    warn!(attempt, %invoice_number, "Invoice number taken, retrying");
                }
                Err(err) => return Err(ServiceError::db_error(err)),
            }
        }

        let invoice = issued.ok_or_else(|| {
            ServiceError::Conflict(format!(
                "Could not allocate a unique invoice number after {} attempts",
                attempts
            ))
        })?;

        info!(
            invoice_id = invoice.id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total_amount,
            "Invoice issued"
        );

        let document = match self.export_document(&invoice, &company, &sheet).await {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(invoice_id = invoice.id, error = %e, "Invoice document export failed");
                None
            }
        };

        Ok(IssuedInvoice {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            total_amount: round_currency(invoice.total_amount),
            invoice_date: invoice.invoice_date,
            due_date: invoice.due_date,
            document,
        })
    }

    pub async fn mark_invoice_paid(&self, invoice_id: i32) -> Result<InvoiceView, ServiceError> {
        self.mark_invoice_paid_on(invoice_id, today()).await
    }

    /// Records payment. An invoice that is already paid keeps its payment date.
    #[instrument(skip(self))]
    pub async fn mark_invoice_paid_on(
        &self,
        invoice_id: i32,
        payment_date: NaiveDate,
    ) -> Result<InvoiceView, ServiceError> {
        let existing = self.find(invoice_id).await?;
        let company_name = self.company_name(existing.company_id).await?;

        if existing.is_paid() {
            info!(invoice_id, "Invoice already paid");
            return Ok(InvoiceView::new(existing, company_name, payment_date));
        }

        let mut model: invoice::ActiveModel = existing.into();
        model.payment_status = Set(PaymentStatus::Paid);
        model.payment_date = Set(Some(payment_date));
        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;

        info!(invoice_id, %payment_date, "Invoice marked paid");
        Ok(InvoiceView::new(updated, company_name, payment_date))
    }

    /// Renders the invoice, mails it with the document attached, then stamps
    /// the delivery. A failed send leaves the invoice untouched.
    #[instrument(skip(self))]
    pub async fn send_invoice_email(
        &self,
        invoice_id: i32,
        email_address: &str,
    ) -> Result<InvoiceView, ServiceError> {
        let recipient = validate_recipient(email_address)?;
        let (invoice, company, sheet) = self.load(invoice_id).await?;

        let doc = InvoiceDocument {
            invoice: &invoice,
            company: &company,
            load_sheet: &sheet,
            today: today(),
        };
        let rendered = self.renderer.render_invoice(&doc)?;
        let url = match self.exporter.export(&rendered).await {
            Ok(exported) => Some(exported.url),
            Err(e) => {
                warn!(invoice_id, error = %e, "Invoice document export failed before email");
                None
            }
        };

        let email = OutgoingEmail {
            to: recipient.clone(),
            subject: self.renderer.invoice_subject(&doc),
            html_body: self.renderer.render_invoice_email(&doc, url.as_deref())?,
            attachment: Some(EmailAttachment {
                file_name: rendered.file_name(),
                content_type: "text/html; charset=utf-8".to_string(),
                content: rendered.html.into_bytes(),
            }),
        };
        self.mailer.send(&email).await?;

        let company_name = Some(company.name.clone());
        let mut model: invoice::ActiveModel = invoice.into();
        model.email_sent_date = Set(Some(Utc::now()));
        model.email_sent_to = Set(Some(recipient.clone()));
        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;

        info!(invoice_id, to = %recipient, "Invoice emailed");
        Ok(InvoiceView::new(updated, company_name, today()))
    }

    /// Re-renders and re-exports the invoice document to its fixed location.
    #[instrument(skip(self))]
    pub async fn export_invoice(&self, invoice_id: i32) -> Result<ExportedDocument, ServiceError> {
        let (invoice, company, sheet) = self.load(invoice_id).await?;
        self.export_document(&invoice, &company, &sheet).await
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, invoice_id: i32) -> Result<InvoiceView, ServiceError> {
        let invoice = self.find(invoice_id).await?;
        let company_name = self.company_name(invoice.company_id).await?;
        Ok(InvoiceView::new(invoice, company_name, today()))
    }

    pub async fn list_invoices(
        &self,
        filter: InvoiceFilter,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<InvoiceView>, ServiceError> {
        self.list_invoices_on(filter, pagination, today()).await
    }

    /// Newest first. The status filter uses the display status as of `today`.
    #[instrument(skip(self))]
    pub async fn list_invoices_on(
        &self,
        filter: InvoiceFilter,
        pagination: Pagination,
        today: NaiveDate,
    ) -> Result<PaginatedResponse<InvoiceView>, ServiceError> {
        let mut select = invoice::Entity::find()
            .order_by_desc(invoice::Column::InvoiceDate)
            .order_by_desc(invoice::Column::Id);
        if let Some(company_id) = filter.company_id {
            select = select.filter(invoice::Column::CompanyId.eq(company_id));
        }
        if let Some(status) = filter.status {
            select = select.filter(display_status_condition(status, today));
        }

        let page = paginate(&*self.db, select, pagination, |inv| inv).await?;

        let company_ids: Vec<i32> = page.items.iter().map(|inv| inv.company_id).collect();
        let names: HashMap<i32, String> = company::Entity::find()
            .filter(company::Column::Id.is_in(company_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        Ok(PaginatedResponse {
            items: page
                .items
                .into_iter()
                .map(|inv| {
                    let name = names.get(&inv.company_id).cloned();
                    InvoiceView::new(inv, name, today)
                })
                .collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        })
    }

    async fn export_document(
        &self,
        invoice: &invoice::Model,
        company: &company::Model,
        sheet: &load_sheet::Model,
    ) -> Result<ExportedDocument, ServiceError> {
        let rendered = self.renderer.render_invoice(&InvoiceDocument {
            invoice,
            company,
            load_sheet: sheet,
            today: today(),
        })?;
        self.exporter.export(&rendered).await
    }

    async fn find(&self, invoice_id: i32) -> Result<invoice::Model, ServiceError> {
        invoice::Entity::find_by_id(invoice_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", invoice_id)))
    }

    async fn company_name(&self, company_id: i32) -> Result<Option<String>, ServiceError> {
        Ok(company::Entity::find_by_id(company_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .map(|c| c.name))
    }

    async fn invoice_for_load_sheet(
        &self,
        load_sheet_id: i32,
    ) -> Result<Option<invoice::Model>, ServiceError> {
        invoice::Entity::find()
            .filter(invoice::Column::LoadSheetId.eq(load_sheet_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn load(
        &self,
        invoice_id: i32,
    ) -> Result<(invoice::Model, company::Model, load_sheet::Model), ServiceError> {
        let invoice = self.find(invoice_id).await?;
        let company = company::Entity::find_by_id(invoice.company_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Company {} not found", invoice.company_id))
            })?;
        let sheet = load_sheet::Entity::find_by_id(invoice.load_sheet_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Load sheet {} not found", invoice.load_sheet_id))
            })?;
        Ok((invoice, company, sheet))
    }
}

/// Store-side equivalent of [`InvoiceDisplayStatus::derive`].
pub(crate) fn display_status_condition(status: InvoiceDisplayStatus, today: NaiveDate) -> Condition {
    match status {
        InvoiceDisplayStatus::Paid => {
            Condition::all().add(invoice::Column::PaymentStatus.eq(PaymentStatus::Paid))
        }
        InvoiceDisplayStatus::Pending => Condition::all()
            .add(invoice::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .add(invoice::Column::DueDate.gte(today)),
        InvoiceDisplayStatus::Overdue => Condition::all()
            .add(invoice::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .add(invoice::Column::DueDate.lt(today)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn settings_come_from_billing_config() {
        let cfg = BillingConfig {
            vat_rate: dec!(14),
            ..BillingConfig::default()
        };
        let settings = BillingSettings::from(&cfg);
        assert_eq!(settings.vat_rate, dec!(14));
        assert!(settings.require_completed_load_sheet);
        assert_eq!(settings.invoice_number_attempts, 5);
    }

    #[test]
    fn view_reports_derived_overdue() {
        let inv = invoice::Model {
            id: 1,
            load_sheet_id: 1,
            company_id: 1,
            invoice_number: "INV202501001".into(),
            invoice_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 2, 9).unwrap(),
            subtotal: dec!(1000),
            vat_rate: dec!(15),
            vat_amount: dec!(150),
            total_amount: dec!(1150),
            payment_status: PaymentStatus::Pending,
            payment_date: None,
            email_sent_date: None,
            email_sent_to: None,
            created_at: Utc::now(),
        };
        let late = InvoiceView::new(inv.clone(), None, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(late.status, InvoiceDisplayStatus::Overdue);
        assert_eq!(late.payment_status, PaymentStatus::Pending);

        let on_time = InvoiceView::new(inv, None, NaiveDate::from_ymd_opt(2025, 2, 9).unwrap());
        assert_eq!(on_time.status, InvoiceDisplayStatus::Pending);
        assert_eq!(on_time.total_amount.to_string(), "1150.00");
    }
}
