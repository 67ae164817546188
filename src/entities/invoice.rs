use super::enums::{InvoiceDisplayStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub load_sheet_id: i32,
    pub company_id: i32,
    #[sea_orm(unique)]
    pub invoice_number: String,
    pub invoice_date: Date,
    pub due_date: Date,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub subtotal: Decimal,
    /// VAT percentage in force when the invoice was issued.
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub vat_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub vat_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<Date>,
    pub email_sent_date: Option<DateTime<Utc>>,
    pub email_sent_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn display_status(&self, today: Date) -> InvoiceDisplayStatus {
        InvoiceDisplayStatus::derive(self.payment_status, self.due_date, today)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::load_sheet::Entity",
        from = "Column::LoadSheetId",
        to = "super::load_sheet::Column::Id"
    )]
    LoadSheet,
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
}

impl Related<super::load_sheet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoadSheet.def()
    }
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
