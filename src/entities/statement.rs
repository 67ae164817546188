use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Monthly roll-up of a company's invoices. Rows are never updated after
/// generation except for the email stamp.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "statements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub company_id: i32,
    /// `YYYY-MM`
    pub statement_period: String,
    pub statement_date: Date,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub opening_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_charges: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_payments: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub closing_balance: Decimal,
    pub invoice_count: i32,
    pub email_sent: bool,
    pub email_sent_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn statement_number(&self) -> String {
        crate::services::numbering::statement_number(self.statement_date, self.id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
    #[sea_orm(has_many = "super::statement_item::Entity")]
    Items,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::statement_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
