use super::enums::{DeliveryMethod, LoadSheetStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};

/// A single delivery job. `final_rate` is fixed when the row is written.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "load_sheets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub company_id: i32,
    pub pallet_quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub rate_per_pallet: Decimal,
    pub cargo_description: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub contractor_name: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub contractor_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub final_rate: Decimal,
    pub status: LoadSheetStatus,
    pub requested_date: Date,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
    #[sea_orm(has_one = "super::invoice::Entity")]
    Invoice,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}
