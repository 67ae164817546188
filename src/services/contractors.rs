use crate::{
    entities::{contractor, RecordStatus},
    errors::ServiceError,
    services::clean_optional,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ContractorInput {
    #[validate(length(min = 1, max = 255, message = "Contractor name is required"))]
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Third-party carriers available for contractor deliveries.
#[derive(Clone)]
pub struct ContractorService {
    db: Arc<DatabaseConnection>,
}

impl ContractorService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_contractor(
        &self,
        input: ContractorInput,
    ) -> Result<contractor::Model, ServiceError> {
        let input = ContractorInput {
            name: input.name.trim().to_string(),
            contact_person: clean_optional(input.contact_person),
            phone: clean_optional(input.phone),
            email: clean_optional(input.email),
        };
        input.validate()?;

        let model = contractor::ActiveModel {
            name: Set(input.name.clone()),
            contact_person: Set(input.contact_person),
            phone: Set(input.phone),
            email: Set(input.email),
            status: Set(RecordStatus::Active),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await.map_err(|e| {
            ServiceError::from_write(
                e,
                format!("A contractor named '{}' already exists", input.name),
            )
        })?;

        info!(contractor_id = created.id, "Contractor created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_contractor(&self, contractor_id: i32) -> Result<contractor::Model, ServiceError> {
        contractor::Entity::find_by_id(contractor_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Contractor {} not found", contractor_id)))
    }

    /// Contractors ordered by name; inactive ones only when asked for.
    #[instrument(skip(self))]
    pub async fn list_contractors(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<contractor::Model>, ServiceError> {
        let mut select = contractor::Entity::find().order_by_asc(contractor::Column::Name);
        if !include_inactive {
            select = select.filter(contractor::Column::Status.eq(RecordStatus::Active));
        }
        select.all(&*self.db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        contractor_id: i32,
        status: RecordStatus,
    ) -> Result<contractor::Model, ServiceError> {
        let existing = self.get_contractor(contractor_id).await?;
        if existing.status == status {
            return Ok(existing);
        }
        let mut model: contractor::ActiveModel = existing.into();
        model.status = Set(status);
        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;
        info!(contractor_id, status = %status, "Contractor status changed");
        Ok(updated)
    }
}
