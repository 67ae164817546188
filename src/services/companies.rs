use crate::{
    entities::{company, invoice, load_sheet, statement, RecordStatus},
    errors::ServiceError,
    services::{billing::round_currency, clean_optional, paginate, Pagination},
    PaginatedResponse,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Fields accepted when creating or editing a company.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CompanyInput {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "Contact person is required"))]
    pub contact_person: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, max = 50, message = "Phone number is required"))]
    pub phone: String,
    pub billing_address: Option<String>,
    pub vat_number: Option<String>,
    #[validate(custom = "crate::services::validate_positive_amount")]
    #[schema(value_type = String, example = "250.00")]
    pub rate_per_pallet: Decimal,
    /// Days until an invoice falls due. Defaults to the configured terms.
    #[validate(range(min = 0, max = 365))]
    pub payment_terms: Option<i32>,
    pub status: Option<RecordStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CompanyFilter {
    pub status: Option<RecordStatus>,
}

#[derive(Clone)]
pub struct CompanyService {
    db: Arc<DatabaseConnection>,
    default_payment_terms: i32,
}

impl CompanyService {
    pub fn new(db: Arc<DatabaseConnection>, default_payment_terms: i32) -> Self {
        Self {
            db,
            default_payment_terms,
        }
    }

    fn normalized(input: &CompanyInput) -> Result<CompanyInput, ServiceError> {
        let mut input = input.clone();
        input.name = input.name.trim().to_string();
        input.contact_person = input.contact_person.trim().to_string();
        input.email = input.email.trim().to_string();
        input.phone = input.phone.trim().to_string();
        input.billing_address = clean_optional(input.billing_address);
        input.vat_number = clean_optional(input.vat_number);
        input.rate_per_pallet = round_currency(input.rate_per_pallet);
        input.validate()?;
        Ok(input)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_company(&self, input: CompanyInput) -> Result<company::Model, ServiceError> {
        let input = Self::normalized(&input)?;

        let model = company::ActiveModel {
            name: Set(input.name.clone()),
            contact_person: Set(input.contact_person),
            email: Set(input.email),
            phone: Set(input.phone),
            billing_address: Set(input.billing_address),
            vat_number: Set(input.vat_number),
            rate_per_pallet: Set(input.rate_per_pallet),
            payment_terms: Set(input.payment_terms.unwrap_or(self.default_payment_terms)),
            status: Set(input.status.unwrap_or_default()),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await.map_err(|e| {
            ServiceError::from_write(e, format!("A company named '{}' already exists", input.name))
        })?;

        info!(company_id = created.id, "Company created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_company(
        &self,
        company_id: i32,
        input: CompanyInput,
    ) -> Result<company::Model, ServiceError> {
        let input = Self::normalized(&input)?;
        let existing = self.get_company(company_id).await?;

        let mut model: company::ActiveModel = existing.clone().into();
        model.name = Set(input.name.clone());
        model.contact_person = Set(input.contact_person);
        model.email = Set(input.email);
        model.phone = Set(input.phone);
        model.billing_address = Set(input.billing_address);
        model.vat_number = Set(input.vat_number);
        model.rate_per_pallet = Set(input.rate_per_pallet);
        model.payment_terms = Set(input.payment_terms.unwrap_or(existing.payment_terms));
        if let Some(status) = input.status {
            model.status = Set(status);
        }

        let updated = model.update(&*self.db).await.map_err(|e| {
            ServiceError::from_write(e, format!("A company named '{}' already exists", input.name))
        })?;

        info!(company_id, "Company updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn get_company(&self, company_id: i32) -> Result<company::Model, ServiceError> {
        company::Entity::find_by_id(company_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", company_id)))
    }

    /// Companies ordered by name.
    #[instrument(skip(self))]
    pub async fn list_companies(
        &self,
        filter: CompanyFilter,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<company::Model>, ServiceError> {
        let mut select = company::Entity::find().order_by_asc(company::Column::Name);
        if let Some(status) = filter.status {
            select = select.filter(company::Column::Status.eq(status));
        }
        paginate(&*self.db, select, pagination, |c| c).await
    }

    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        company_id: i32,
        status: RecordStatus,
    ) -> Result<company::Model, ServiceError> {
        let existing = self.get_company(company_id).await?;
        if existing.status == status {
            return Ok(existing);
        }

        let mut model: company::ActiveModel = existing.into();
        model.status = Set(status);
        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;

        info!(company_id, status = %status, "Company status changed");
        Ok(updated)
    }

    /// Deletes an inactive company with no load sheets, invoices or statements.
    #[instrument(skip(self))]
    pub async fn delete_company(&self, company_id: i32) -> Result<(), ServiceError> {
        let existing = self.get_company(company_id).await?;
        if existing.status != RecordStatus::Inactive {
            return Err(ServiceError::Conflict(format!(
                "Company {} must be inactive before it can be deleted",
                company_id
            )));
        }

        let db = &*self.db;
        let references = load_sheet::Entity::find()
            .filter(load_sheet::Column::CompanyId.eq(company_id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?
            + invoice::Entity::find()
                .filter(invoice::Column::CompanyId.eq(company_id))
                .count(db)
                .await
                .map_err(ServiceError::db_error)?
            + statement::Entity::find()
                .filter(statement::Column::CompanyId.eq(company_id))
                .count(db)
                .await
                .map_err(ServiceError::db_error)?;
        if references > 0 {
            return Err(ServiceError::Conflict(format!(
                "Company {} has billing history and cannot be deleted",
                company_id
            )));
        }

        company::Entity::delete_by_id(company_id)
            .exec(db)
            .await
            .map_err(|e| ServiceError::from_write(e, "Company is still referenced"))?;

        info!(company_id, "Company deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> CompanyInput {
        CompanyInput {
            name: "  Acme Foods ".into(),
            contact_person: "Jane".into(),
            email: "jane@acme.test".into(),
            phone: "011 555 0000".into(),
            billing_address: Some("   ".into()),
            vat_number: None,
            rate_per_pallet: dec!(250),
            payment_terms: None,
            status: None,
        }
    }

    #[test]
    fn normalizes_text_fields() {
        let n = CompanyService::normalized(&input()).unwrap();
        assert_eq!(n.name, "Acme Foods");
        assert_eq!(n.billing_address, None);
    }

    #[test]
    fn rejects_bad_email_and_rate() {
        let mut bad = input();
        bad.email = "nope".into();
        assert!(matches!(
            CompanyService::normalized(&bad),
            Err(ServiceError::ValidationError(_))
        ));

        let mut bad = input();
        bad.rate_per_pallet = dec!(0);
        assert!(matches!(
            CompanyService::normalized(&bad),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn rate_is_stored_in_cents_and_bounded() {
        let mut odd = input();
        odd.rate_per_pallet = dec!(12.345);
        let n = CompanyService::normalized(&odd).unwrap();
        assert_eq!(n.rate_per_pallet.to_string(), "12.35");

        let mut huge = input();
        huge.rate_per_pallet = Decimal::MAX;
        assert!(matches!(
            CompanyService::normalized(&huge),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_missing_name() {
        let mut bad = input();
        bad.name = "   ".into();
        assert!(CompanyService::normalized(&bad).is_err());
    }
}
