use super::{DocumentKind, RenderedDocument};
use crate::{
    config::DocumentsConfig,
    entities::{company, invoice, load_sheet, statement, statement_item},
    errors::ServiceError,
    services::{billing::round_currency, statements::StatementPeriod},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::debug;

const INVOICE_TEMPLATE: &str = "invoice.html";
const STATEMENT_TEMPLATE: &str = "statement.html";
const INVOICE_EMAIL_TEMPLATE: &str = "invoice_email.html";
const STATEMENT_EMAIL_TEMPLATE: &str = "statement_email.html";

/// `R 1,234.50`: two decimals, comma thousands separator.
pub fn format_money(symbol: &str, amount: Decimal) -> String {
    let rounded = round_currency(amount);
    let sign = if rounded.is_sign_negative() { "-" } else { "" };
    let digits = rounded.abs().to_string();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{} {}.{}", sign, symbol, grouped, fraction)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn status_label(status: impl ToString) -> String {
    let raw = status.to_string();
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => raw,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuerView {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub vat_number: Option<String>,
}

impl From<&DocumentsConfig> for IssuerView {
    fn from(cfg: &DocumentsConfig) -> Self {
        Self {
            name: cfg.issuer_name.clone(),
            address: cfg.issuer_address.clone(),
            phone: cfg.issuer_phone.clone(),
            email: cfg.issuer_email.clone(),
            vat_number: cfg.issuer_vat_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyView {
    pub name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub billing_address: Option<String>,
    pub vat_number: Option<String>,
    pub payment_terms: i32,
}

impl From<&company::Model> for CompanyView {
    fn from(c: &company::Model) -> Self {
        Self {
            name: c.name.clone(),
            contact_person: c.contact_person.clone(),
            email: c.email.clone(),
            phone: c.phone.clone(),
            billing_address: c.billing_address.clone(),
            vat_number: c.vat_number.clone(),
            payment_terms: c.payment_terms,
        }
    }
}

/// Everything printed on an invoice.
pub struct InvoiceDocument<'a> {
    pub invoice: &'a invoice::Model,
    pub company: &'a company::Model,
    pub load_sheet: &'a load_sheet::Model,
    /// Reference date for the overdue badge
    pub today: NaiveDate,
}

/// Everything printed on a statement.
pub struct StatementDocument<'a> {
    pub statement: &'a statement::Model,
    pub company: &'a company::Model,
    pub items: &'a [statement_item::Model],
}

impl StatementDocument<'_> {
    pub fn statement_number(&self) -> String {
        self.statement.statement_number()
    }
}

pub struct DocumentRenderer {
    tera: Tera,
    issuer: IssuerView,
    currency_symbol: String,
}

impl DocumentRenderer {
    pub fn new(issuer: IssuerView, currency_symbol: impl Into<String>) -> Result<Self, ServiceError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (INVOICE_TEMPLATE, include_str!("../../templates/invoice.html")),
            (STATEMENT_TEMPLATE, include_str!("../../templates/statement.html")),
            (
                INVOICE_EMAIL_TEMPLATE,
                include_str!("../../templates/invoice_email.html"),
            ),
            (
                STATEMENT_EMAIL_TEMPLATE,
                include_str!("../../templates/statement_email.html"),
            ),
        ])
        .map_err(|e| ServiceError::InternalError(format!("Failed to load document templates: {}", e)))?;

        debug!("Document templates loaded");

        Ok(Self {
            tera,
            issuer,
            currency_symbol: currency_symbol.into(),
        })
    }

    pub fn from_config(cfg: &DocumentsConfig) -> Result<Self, ServiceError> {
        Self::new(IssuerView::from(cfg), cfg.currency_symbol.clone())
    }

    fn money(&self, amount: Decimal) -> String {
        format_money(&self.currency_symbol, amount)
    }

    fn render(&self, template_name: &str, context: &Context) -> Result<String, ServiceError> {
        self.tera.render(template_name, context).map_err(|e| {
            ServiceError::ExportError(format!("Failed to render template {}: {}", template_name, e))
        })
    }

    fn invoice_context(&self, doc: &InvoiceDocument<'_>) -> Context {
        let inv = doc.invoice;
        let status = inv.display_status(doc.today);
        let description = doc
            .load_sheet
            .cargo_description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Pallet delivery (load sheet #{})", doc.load_sheet.id));

        let mut context = Context::new();
        context.insert("issuer", &self.issuer);
        context.insert("company", &CompanyView::from(doc.company));
        context.insert(
            "invoice",
            &serde_json::json!({
                "number": inv.invoice_number,
                "invoice_date": format_date(inv.invoice_date),
                "due_date": format_date(inv.due_date),
                "status": status,
                "status_label": status_label(status),
                "subtotal": self.money(inv.subtotal),
                "vat_rate": inv.vat_rate.normalize().to_string(),
                "vat_amount": self.money(inv.vat_amount),
                "total": self.money(inv.total_amount),
            }),
        );
        context.insert(
            "load_sheet",
            &serde_json::json!({
                "description": description,
                "requested_date": format_date(doc.load_sheet.requested_date),
                "pallet_quantity": doc.load_sheet.pallet_quantity,
                "rate_per_pallet": self.money(doc.load_sheet.rate_per_pallet),
            }),
        );
        context
    }

    fn statement_context(&self, doc: &StatementDocument<'_>) -> Context {
        let st = doc.statement;
        let period_label = st
            .statement_period
            .parse::<StatementPeriod>()
            .map(|p| p.label())
            .unwrap_or_else(|_| st.statement_period.clone());

        let items: Vec<serde_json::Value> = doc
            .items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "invoice_number": item.invoice_number,
                    "invoice_date": format_date(item.invoice_date),
                    "amount": self.money(item.amount),
                    "status": item.payment_status,
                    "status_label": status_label(item.payment_status),
                    "payment_date": item.payment_date.map(format_date),
                })
            })
            .collect();

        let mut context = Context::new();
        context.insert("issuer", &self.issuer);
        context.insert("company", &CompanyView::from(doc.company));
        context.insert(
            "statement",
            &serde_json::json!({
                "number": doc.statement_number(),
                "period_label": period_label,
                "statement_date": format_date(st.statement_date),
                "opening_balance": self.money(st.opening_balance),
                "total_charges": self.money(st.total_charges),
                "total_payments": self.money(st.total_payments),
                "closing_balance": self.money(st.closing_balance),
                "invoice_count": st.invoice_count,
            }),
        );
        context.insert("items", &items);
        context
    }

    pub fn render_invoice(&self, doc: &InvoiceDocument<'_>) -> Result<RenderedDocument, ServiceError> {
        let html = self.render(INVOICE_TEMPLATE, &self.invoice_context(doc))?;
        Ok(RenderedDocument {
            kind: DocumentKind::Invoice,
            identifier: DocumentKind::Invoice.identifier(&doc.invoice.invoice_number),
            html,
        })
    }

    pub fn render_statement(
        &self,
        doc: &StatementDocument<'_>,
    ) -> Result<RenderedDocument, ServiceError> {
        let html = self.render(STATEMENT_TEMPLATE, &self.statement_context(doc))?;
        Ok(RenderedDocument {
            kind: DocumentKind::Statement,
            identifier: DocumentKind::Statement.identifier(&doc.statement_number()),
            html,
        })
    }

    pub fn render_invoice_email(
        &self,
        doc: &InvoiceDocument<'_>,
        document_url: Option<&str>,
    ) -> Result<String, ServiceError> {
        let mut context = self.invoice_context(doc);
        context.insert("document_url", &document_url);
        self.render(INVOICE_EMAIL_TEMPLATE, &context)
    }

    pub fn render_statement_email(
        &self,
        doc: &StatementDocument<'_>,
        document_url: Option<&str>,
    ) -> Result<String, ServiceError> {
        let mut context = self.statement_context(doc);
        context.insert("document_url", &document_url);
        self.render(STATEMENT_EMAIL_TEMPLATE, &context)
    }

    /// `Invoice INV202506001 - Acme Foods`
    pub fn invoice_subject(&self, doc: &InvoiceDocument<'_>) -> String {
        format!("Invoice {} - {}", doc.invoice.invoice_number, doc.company.name)
    }

    /// `Monthly Statement STMT202506007 - Acme Foods`
    pub fn statement_subject(&self, doc: &StatementDocument<'_>) -> String {
        format!(
            "Monthly Statement {} - {}",
            doc.statement_number(),
            doc.company.name
        )
    }
}

impl std::fmt::Debug for DocumentRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRenderer")
            .field("issuer", &self.issuer.name)
            .field("currency_symbol", &self.currency_symbol)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DeliveryMethod, LoadSheetStatus, PaymentStatus, RecordStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn company() -> company::Model {
        company::Model {
            id: 3,
            name: "Fresh & Co".into(),
            contact_person: "Thandi Mokoena".into(),
            email: "accounts@freshco.test".into(),
            phone: "021 555 0101".into(),
            billing_address: Some("12 Dock Road, Cape Town".into()),
            vat_number: None,
            rate_per_pallet: dec!(250),
            payment_terms: 30,
            status: RecordStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn load_sheet() -> load_sheet::Model {
        load_sheet::Model {
            id: 9,
            company_id: 3,
            pallet_quantity: 4,
            rate_per_pallet: dec!(250),
            cargo_description: Some("Chilled produce".into()),
            delivery_method: DeliveryMethod::Own,
            contractor_name: None,
            contractor_cost: dec!(0),
            final_rate: dec!(1000),
            status: LoadSheetStatus::Completed,
            requested_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn invoice() -> invoice::Model {
        invoice::Model {
            id: 1,
            load_sheet_id: 9,
            company_id: 3,
            invoice_number: "INV202506001".into(),
            invoice_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
            subtotal: dec!(1000),
            vat_rate: dec!(15),
            vat_amount: dec!(150),
            total_amount: dec!(1150),
            payment_status: PaymentStatus::Pending,
            payment_date: None,
            email_sent_date: None,
            email_sent_to: None,
            created_at: Utc::now(),
        }
    }

    fn renderer() -> DocumentRenderer {
        DocumentRenderer::from_config(&DocumentsConfig::default()).unwrap()
    }

    #[test]
    fn money_is_grouped_with_two_decimals() {
        assert_eq!(format_money("R", dec!(1150)), "R 1,150.00");
        assert_eq!(format_money("R", dec!(1234567.891)), "R 1,234,567.89");
        assert_eq!(format_money("R", dec!(0)), "R 0.00");
        assert_eq!(format_money("R", dec!(999.5)), "R 999.50");
        assert_eq!(format_money("R", dec!(-1500)), "-R 1,500.00");
    }

    #[test]
    fn invoice_document_shows_totals_and_escapes_names() {
        let (c, ls, inv) = (company(), load_sheet(), invoice());
        let doc = InvoiceDocument {
            invoice: &inv,
            company: &c,
            load_sheet: &ls,
            today: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
        };
        let rendered = renderer().render_invoice(&doc).unwrap();
        assert_eq!(rendered.identifier, "invoice-INV202506001");
        assert_eq!(rendered.file_name(), "invoice-INV202506001.html");
        assert!(rendered.html.contains("R 1,150.00"));
        assert!(rendered.html.contains("R 150.00"));
        assert!(rendered.html.contains("VAT (15%)"));
        assert!(rendered.html.contains("Fresh &amp; Co"));
        assert!(rendered.html.contains("July 3, 2025"));
        assert!(rendered.html.contains("Pending"));
    }

    #[test]
    fn overdue_badge_uses_reference_date() {
        let (c, ls, inv) = (company(), load_sheet(), invoice());
        let doc = InvoiceDocument {
            invoice: &inv,
            company: &c,
            load_sheet: &ls,
            today: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
        };
        let rendered = renderer().render_invoice(&doc).unwrap();
        assert!(rendered.html.contains("Overdue"));
    }

    #[test]
    fn statement_document_lists_items() {
        let c = company();
        let st = statement::Model {
            id: 7,
            company_id: 3,
            statement_period: "2025-06".into(),
            statement_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            opening_balance: dec!(500),
            total_charges: dec!(800),
            total_payments: dec!(300),
            closing_balance: dec!(1000),
            invoice_count: 1,
            email_sent: false,
            email_sent_date: None,
            created_at: Utc::now(),
        };
        let items = vec![statement_item::Model {
            id: 1,
            statement_id: 7,
            invoice_id: 1,
            invoice_number: "INV202506001".into(),
            invoice_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            amount: dec!(800),
            payment_status: PaymentStatus::Paid,
            payment_date: Some(NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()),
        }];
        let doc = StatementDocument {
            statement: &st,
            company: &c,
            items: &items,
        };
        let r = renderer();
        let rendered = r.render_statement(&doc).unwrap();
        assert_eq!(rendered.identifier, "statement-STMT202507007");
        assert!(rendered.html.contains("June 2025"));
        assert!(rendered.html.contains("INV202506001"));
        assert!(rendered.html.contains("Closing Balance: R 1,000.00"));
        assert!(rendered.html.contains("Paid"));
        assert_eq!(
            r.statement_subject(&doc),
            "Monthly Statement STMT202507007 - Fresh & Co"
        );
    }
}
