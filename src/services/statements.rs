use crate::{
    documents::{DocumentExporter, DocumentRenderer, ExportedDocument, StatementDocument},
    entities::{company, invoice, statement, statement_item, PaymentStatus},
    errors::ServiceError,
    notifications::{EmailAttachment, MailTransport, OutgoingEmail},
    services::{
        billing::{round_currency, statement_rollup},
        paginate, today, validate_recipient, Pagination,
    },
    PaginatedResponse,
};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatementPeriod(NaiveDate);

impl StatementPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, ServiceError> {
        if !(1900..=9999).contains(&year) {
            return Err(ServiceError::ValidationError(format!(
                "Statement year {} is out of range",
                year
            )));
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| ServiceError::ValidationError(format!("Invalid month {}", month)))
    }

    /// The month `date` falls in.
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.0
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(self.0)
    }

    pub fn previous(&self) -> Self {
        self.0.pred_opt().map(Self::containing).unwrap_or(*self)
    }

    /// `June 2025`
    pub fn label(&self) -> String {
        self.0.format("%B %Y").to_string()
    }
}

impl fmt::Display for StatementPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for StatementPeriod {
    type Err = ServiceError;

    /// Accepts `YYYY-MM` and `YYYYMM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid =
            || ServiceError::ValidationError(format!("Invalid statement period '{}'; use YYYY-MM", s));
        if !s.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
            return Err(invalid());
        }

        let (year, month) = match s.split_once('-') {
            Some((y, m)) if y.len() == 4 && m.len() == 2 => (y, m),
            None if s.len() == 6 => s.split_at(4),
            _ => return Err(invalid()),
        };
        if month.contains('-') {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl Serialize for StatementPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StatementPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatementView {
    pub id: i32,
    /// Derived from the statement date and id.
    pub statement_number: String,
    pub company_id: i32,
    pub company_name: Option<String>,
    /// `YYYY-MM`
    pub statement_period: String,
    pub period_label: String,
    pub statement_date: NaiveDate,
    pub opening_balance: Decimal,
    pub total_charges: Decimal,
    pub total_payments: Decimal,
    pub closing_balance: Decimal,
    pub invoice_count: i32,
    pub email_sent: bool,
    pub email_sent_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StatementView {
    pub fn new(st: statement::Model, company_name: Option<String>) -> Self {
        let period_label = st
            .statement_period
            .parse::<StatementPeriod>()
            .map(|p| p.label())
            .unwrap_or_else(|_| st.statement_period.clone());
        Self {
            id: st.id,
            statement_number: st.statement_number(),
            company_id: st.company_id,
            company_name,
            statement_period: st.statement_period,
            period_label,
            statement_date: st.statement_date,
            opening_balance: round_currency(st.opening_balance),
            total_charges: round_currency(st.total_charges),
            total_payments: round_currency(st.total_payments),
            closing_balance: round_currency(st.closing_balance),
            invoice_count: st.invoice_count,
            email_sent: st.email_sent,
            email_sent_date: st.email_sent_date,
            created_at: st.created_at,
        }
    }
}

/// Invoice line as captured when the statement was generated.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatementItemView {
    pub invoice_id: i32,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<NaiveDate>,
}

impl From<statement_item::Model> for StatementItemView {
    fn from(item: statement_item::Model) -> Self {
        Self {
            invoice_id: item.invoice_id,
            invoice_number: item.invoice_number,
            invoice_date: item.invoice_date,
            amount: round_currency(item.amount),
            payment_status: item.payment_status,
            payment_date: item.payment_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatementDetails {
    pub statement: StatementView,
    pub items: Vec<StatementItemView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GeneratedStatement {
    pub statement: StatementView,
    /// Absent when the export failed; the statement itself is still valid.
    pub document: Option<ExportedDocument>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatementFilter {
    pub company_id: Option<i32>,
}

/// Monthly statements: generation, delivery and export.
#[derive(Clone)]
pub struct StatementService {
    db: Arc<DatabaseConnection>,
    renderer: Arc<DocumentRenderer>,
    exporter: Arc<dyn DocumentExporter>,
    mailer: Arc<dyn MailTransport>,
}

impl StatementService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        renderer: Arc<DocumentRenderer>,
        exporter: Arc<dyn DocumentExporter>,
        mailer: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            db,
            renderer,
            exporter,
            mailer,
        }
    }

    pub async fn generate_statement(
        &self,
        company_id: i32,
        period: StatementPeriod,
    ) -> Result<GeneratedStatement, ServiceError> {
        self.generate_statement_on(company_id, period, today()).await
    }

    /// Rolls a company's invoices for `period` into a statement dated
    /// `statement_date`. The opening balance is the previous month's closing
    /// balance, or zero when there is no statement for that month.
    #[instrument(skip(self), fields(period = %period))]
    pub async fn generate_statement_on(
        &self,
        company_id: i32,
        period: StatementPeriod,
        statement_date: NaiveDate,
    ) -> Result<GeneratedStatement, ServiceError> {
        let db = &*self.db;
        let company = company::Entity::find_by_id(company_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", company_id)))?;

        let period_key = period.to_string();
        if self.find_for_period(company_id, period).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A statement for {} already exists for company {}",
                period_key, company_id
            )));
        }

        let invoices = invoice::Entity::find()
            .filter(invoice::Column::CompanyId.eq(company_id))
            .filter(invoice::Column::InvoiceDate.gte(period.first_day()))
            .filter(invoice::Column::InvoiceDate.lte(period.last_day()))
            .order_by_asc(invoice::Column::InvoiceDate)
            .order_by_asc(invoice::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        if invoices.is_empty() {
            return Err(ServiceError::NothingToBill(format!(
                "Company {} has no invoices in {}",
                company_id, period_key
            )));
        }

        let prior_closing = self
            .find_for_period(company_id, period.previous())
            .await?
            .map(|st| st.closing_balance)
            .unwrap_or(Decimal::ZERO);
        let totals = statement_rollup(&invoices, prior_closing);

        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let created = statement::ActiveModel {
            company_id: Set(company_id),
            statement_period: Set(period_key.clone()),
            statement_date: Set(statement_date),
            opening_balance: Set(totals.opening_balance),
            total_charges: Set(totals.total_charges),
            total_payments: Set(totals.total_payments),
            closing_balance: Set(totals.closing_balance),
            invoice_count: Set(totals.invoice_count),
            email_sent: Set(false),
            email_sent_date: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            ServiceError::from_write(
                e,
                format!(
                    "A statement for {} already exists for company {}",
                    period_key, company_id
                ),
            )
        })?;

        let items = invoices.iter().map(|inv| statement_item::ActiveModel {
            statement_id: Set(created.id),
            invoice_id: Set(inv.id),
            invoice_number: Set(inv.invoice_number.clone()),
            invoice_date: Set(inv.invoice_date),
            amount: Set(round_currency(inv.total_amount)),
            payment_status: Set(inv.payment_status),
            payment_date: Set(inv.payment_date),
            ..Default::default()
        });
        statement_item::Entity::insert_many(items)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            statement_id = created.id,
            statement_number = %created.statement_number(),
            closing_balance = %created.closing_balance,
            invoice_count = created.invoice_count,
            "Statement generated"
        );

        let document = match self.export_document(&created, &company).await {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(statement_id = created.id, error = %e, "Statement document export failed");
                None
            }
        };

        Ok(GeneratedStatement {
            statement: StatementView::new(created, Some(company.name)),
            document,
        })
    }

    /// Statement with its item snapshots, in invoice-date order.
    #[instrument(skip(self))]
    pub async fn get_statement_details(
        &self,
        statement_id: i32,
    ) -> Result<StatementDetails, ServiceError> {
        let (st, company, items) = self.load(statement_id).await?;
        Ok(StatementDetails {
            statement: StatementView::new(st, Some(company.name)),
            items: items.into_iter().map(StatementItemView::from).collect(),
        })
    }

    /// Newest period first.
    #[instrument(skip(self))]
    pub async fn list_statements(
        &self,
        filter: StatementFilter,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<StatementView>, ServiceError> {
        let mut select = statement::Entity::find()
            .order_by_desc(statement::Column::StatementPeriod)
            .order_by_desc(statement::Column::Id);
        if let Some(company_id) = filter.company_id {
            select = select.filter(statement::Column::CompanyId.eq(company_id));
        }
        let page = paginate(&*self.db, select, pagination, |st| st).await?;

        let company_ids: Vec<i32> = page.items.iter().map(|st| st.company_id).collect();
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
                .map(|st| {
                    let name = names.get(&st.company_id).cloned();
                    StatementView::new(st, name)
                })
                .collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        })
    }

    /// Mails the statement with its document attached and marks it sent.
    #[instrument(skip(self))]
    pub async fn send_statement_email(
        &self,
        statement_id: i32,
        email_address: &str,
    ) -> Result<StatementView, ServiceError> {
        let recipient = validate_recipient(email_address)?;
        let (st, company, items) = self.load(statement_id).await?;

        let doc = StatementDocument {
            statement: &st,
            company: &company,
            items: &items,
        };
        let rendered = self.renderer.render_statement(&doc)?;
        let url = match self.exporter.export(&rendered).await {
            Ok(exported) => Some(exported.url),
            Err(e) => {
                warn!(statement_id, error = %e, "Statement document export failed before email");
                None
            }
        };

        let email = OutgoingEmail {
            to: recipient.clone(),
            subject: self.renderer.statement_subject(&doc),
            html_body: self.renderer.render_statement_email(&doc, url.as_deref())?,
            attachment: Some(EmailAttachment {
                file_name: rendered.file_name(),
                content_type: "text/html; charset=utf-8".to_string(),
                content: rendered.html.into_bytes(),
            }),
        };
        self.mailer.send(&email).await?;

        let mut model: statement::ActiveModel = st.into();
        model.email_sent = Set(true);
        model.email_sent_date = Set(Some(Utc::now()));
        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;

        info!(statement_id, to = %recipient, "Statement emailed");
        Ok(StatementView::new(updated, Some(company.name)))
    }

    /// Re-renders and re-exports the statement document to its fixed location.
    #[instrument(skip(self))]
    pub async fn export_statement(
        &self,
        statement_id: i32,
    ) -> Result<ExportedDocument, ServiceError> {
        let (st, company, _) = self.load(statement_id).await?;
        self.export_document(&st, &company).await
    }

    async fn export_document(
        &self,
        st: &statement::Model,
        company: &company::Model,
    ) -> Result<ExportedDocument, ServiceError> {
        let items = self.items(st.id).await?;
        let rendered = self.renderer.render_statement(&StatementDocument {
            statement: st,
            company,
            items: &items,
        })?;
        self.exporter.export(&rendered).await
    }

    async fn find_for_period(
        &self,
        company_id: i32,
        period: StatementPeriod,
    ) -> Result<Option<statement::Model>, ServiceError> {
        statement::Entity::find()
            .filter(statement::Column::CompanyId.eq(company_id))
            .filter(statement::Column::StatementPeriod.eq(period.to_string()))
            .order_by_desc(statement::Column::Id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn items(&self, statement_id: i32) -> Result<Vec<statement_item::Model>, ServiceError> {
        statement_item::Entity::find()
            .filter(statement_item::Column::StatementId.eq(statement_id))
            .order_by_asc(statement_item::Column::InvoiceDate)
            .order_by_asc(statement_item::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn load(
        &self,
        statement_id: i32,
    ) -> Result<(statement::Model, company::Model, Vec<statement_item::Model>), ServiceError> {
        let st = statement::Entity::find_by_id(statement_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Statement {} not found", statement_id)))?;
        let company = company::Entity::find_by_id(st.company_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", st.company_id)))?;
        let items = self.items(statement_id).await?;
        Ok((st, company, items))
    }
}
