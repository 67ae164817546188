use crate::{
    entities::{company, invoice, load_sheet, PaymentStatus, RecordStatus},
    errors::ServiceError,
    services::{
        billing::round_currency,
        invoicing::InvoiceView,
        load_sheets::{LoadSheetService, LoadSheetView},
        statements::StatementPeriod,
        today,
    },
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

const RECENT_LIMIT: u64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub as_of: NaiveDate,
    pub invoices_this_month: u64,
    /// Total of every unpaid invoice, overdue ones included.
    pub outstanding_balance: Decimal,
    pub overdue_count: u64,
    pub overdue_balance: Decimal,
    pub active_companies: u64,
    pub recent_load_sheets: Vec<LoadSheetView>,
    /// Unpaid invoices with the earliest due dates.
    pub pending_invoices: Vec<InvoiceView>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
    load_sheets: LoadSheetService,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            load_sheets: LoadSheetService::new(db.clone()),
            db,
        }
    }

    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        self.summary_on(today()).await
    }

    #[instrument(skip(self))]
    pub async fn summary_on(&self, today: NaiveDate) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db;
        let month = StatementPeriod::containing(today);

        let invoices_this_month = invoice::Entity::find()
            .filter(invoice::Column::InvoiceDate.gte(month.first_day()))
            .filter(invoice::Column::InvoiceDate.lte(month.last_day()))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        let unpaid = invoice::Entity::find()
            .filter(invoice::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .order_by_asc(invoice::Column::DueDate)
            .order_by_asc(invoice::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let (outstanding, overdue_count, overdue_balance) = unpaid.iter().fold(
            (Decimal::ZERO, 0u64, Decimal::ZERO),
            |(outstanding, count, overdue), inv| {
                if inv.due_date < today {
                    (outstanding + inv.total_amount, count + 1, overdue + inv.total_amount)
                } else {
                    (outstanding + inv.total_amount, count, overdue)
                }
            },
        );

        let active_companies = company::Entity::find()
            .filter(company::Column::Status.eq(RecordStatus::Active))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        let recent = load_sheet::Entity::find()
            .order_by_desc(load_sheet::Column::CreatedAt)
            .order_by_desc(load_sheet::Column::Id)
            .limit(RECENT_LIMIT)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let recent_load_sheets = self.load_sheets.views(recent).await?;

        let pending: Vec<invoice::Model> = unpaid.into_iter().take(RECENT_LIMIT as usize).collect();
        let company_ids: Vec<i32> = pending.iter().map(|inv| inv.company_id).collect();
        let names: HashMap<i32, String> = company::Entity::find()
            .filter(company::Column::Id.is_in(company_ids))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let pending_invoices = pending
            .into_iter()
            .map(|inv| {
                let name = names.get(&inv.company_id).cloned();
                InvoiceView::new(inv, name, today)
            })
            .collect();

        Ok(DashboardSummary {
            as_of: today,
            invoices_this_month,
            outstanding_balance: round_currency(outstanding),
            overdue_count,
            overdue_balance: round_currency(overdue_balance),
            active_companies,
            recent_load_sheets,
            pending_invoices,
        })
    }
}
