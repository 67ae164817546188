use crate::{
    entities::{
        company, contractor, invoice, load_sheet, DeliveryMethod, LoadSheetStatus, PresentedStatus,
        RecordStatus,
    },
    errors::ServiceError,
    services::{
        billing::{contractor_profit, load_sheet_subtotal, round_currency},
        clean_optional, paginate, today, validate_non_negative_amount, validate_positive_amount,
        Pagination,
    },
    PaginatedResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Fields for a new load sheet.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewLoadSheet {
    pub company_id: i32,
    #[validate(range(min = 1, message = "Pallet quantity must be at least 1"))]
    pub pallet_quantity: i32,
    /// Defaults to the company's current rate.
    pub rate_per_pallet: Option<Decimal>,
    pub cargo_description: Option<String>,
    /// `own` (alias `own_driver`) or `contractor`. Defaults to `own`.
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethod>,
    /// Registered contractor; its name is copied onto the load sheet.
    pub contractor_id: Option<i32>,
    /// Free-text contractor name when no registered contractor is used.
    pub contractor_name: Option<String>,
    pub contractor_cost: Option<Decimal>,
    /// Either vocabulary: `draft|confirmed|completed` or `pending|in_progress|completed`.
    pub status: Option<String>,
    pub requested_date: Option<NaiveDate>,
}

/// Partial edit. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct LoadSheetChanges {
    #[validate(range(min = 1, message = "Pallet quantity must be at least 1"))]
    pub pallet_quantity: Option<i32>,
    pub rate_per_pallet: Option<Decimal>,
    pub cargo_description: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
    pub contractor_id: Option<i32>,
    pub contractor_name: Option<String>,
    pub contractor_cost: Option<Decimal>,
    pub status: Option<String>,
    pub requested_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoadSheetFilter {
    pub company_id: Option<i32>,
    /// Presented (`pending`, `in_progress`, `completed`) or stored status.
    pub status: Option<String>,
}

/// Load sheet as returned to callers, with the presented status.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LoadSheetView {
    pub id: i32,
    pub company_id: i32,
    pub company_name: Option<String>,
    pub pallet_quantity: i32,
    pub rate_per_pallet: Decimal,
    pub cargo_description: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub contractor_name: Option<String>,
    pub contractor_cost: Decimal,
    pub final_rate: Decimal,
    /// Only for contractor deliveries.
    pub net_profit: Option<Decimal>,
    pub status: PresentedStatus,
    pub requested_date: NaiveDate,
    pub invoice_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl LoadSheetView {
    pub fn new(sheet: load_sheet::Model, company_name: Option<String>, invoice_id: Option<i32>) -> Self {
        let net_profit = match sheet.delivery_method {
            DeliveryMethod::Contractor => Some(round_currency(contractor_profit(
                sheet.final_rate,
                sheet.contractor_cost,
            ))),
            DeliveryMethod::Own => None,
        };
        Self {
            id: sheet.id,
            company_id: sheet.company_id,
            company_name,
            pallet_quantity: sheet.pallet_quantity,
            rate_per_pallet: round_currency(sheet.rate_per_pallet),
            cargo_description: sheet.cargo_description,
            delivery_method: sheet.delivery_method,
            contractor_name: sheet.contractor_name,
            contractor_cost: round_currency(sheet.contractor_cost),
            final_rate: round_currency(sheet.final_rate),
            net_profit,
            status: sheet.status.presented(),
            requested_date: sheet.requested_date,
            invoice_id,
            created_at: sheet.created_at,
        }
    }
}

/// Resolved pricing for a load sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pricing {
    pallet_quantity: i32,
    rate_per_pallet: Decimal,
    delivery_method: DeliveryMethod,
    contractor_name: Option<String>,
    contractor_cost: Decimal,
}

impl Pricing {
    fn final_rate(&self) -> Result<Decimal, ServiceError> {
        load_sheet_subtotal(self.pallet_quantity, self.rate_per_pallet).map(round_currency)
    }

    fn of(sheet: &load_sheet::Model) -> Self {
        Self {
            pallet_quantity: sheet.pallet_quantity,
            rate_per_pallet: sheet.rate_per_pallet,
            delivery_method: sheet.delivery_method,
            contractor_name: sheet.contractor_name.clone(),
            contractor_cost: sheet.contractor_cost,
        }
    }
}

fn parse_status(raw: &str) -> Result<LoadSheetStatus, ServiceError> {
    LoadSheetStatus::parse_any(raw)
        .ok_or_else(|| ServiceError::ValidationError(format!("Unknown load sheet status '{}'", raw)))
}

fn check_amount(
    field: &str,
    value: Decimal,
    rule: fn(&Decimal) -> Result<(), validator::ValidationError>,
) -> Result<Decimal, ServiceError> {
    let value = round_currency(value);
    rule(&value).map_err(|e| {
        ServiceError::ValidationError(format!(
            "{} {}",
            field,
            e.message.unwrap_or_else(|| e.code.clone())
        ))
    })?;
    Ok(value)
}

#[derive(Clone)]
pub struct LoadSheetService {
    db: Arc<DatabaseConnection>,
}

impl LoadSheetService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn contractor_name(
        &self,
        contractor_id: Option<i32>,
        contractor_name: Option<String>,
    ) -> Result<Option<String>, ServiceError> {
        if let Some(id) = contractor_id {
            let found = contractor::Entity::find_by_id(id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("Contractor {} not found", id)))?;
            return Ok(Some(found.name));
        }
        Ok(clean_optional(contractor_name))
    }

    /// Applies the delivery-method rules: own-driver jobs carry no contractor
    /// and no cost, contractor jobs need a contractor name.
    async fn resolve_pricing(
        &self,
        pallet_quantity: i32,
        rate_per_pallet: Decimal,
        delivery_method: DeliveryMethod,
        contractor_id: Option<i32>,
        contractor_name: Option<String>,
        contractor_cost: Decimal,
    ) -> Result<Pricing, ServiceError> {
        let rate_per_pallet = check_amount("rate_per_pallet", rate_per_pallet, validate_positive_amount)?;

        match delivery_method {
            DeliveryMethod::Own => Ok(Pricing {
                pallet_quantity,
                rate_per_pallet,
                delivery_method,
                contractor_name: None,
                contractor_cost: Decimal::ZERO,
            }),
            DeliveryMethod::Contractor => {
                let contractor_name = self
                    .contractor_name(contractor_id, contractor_name)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::ValidationError(
                            "A contractor is required for contractor deliveries".to_string(),
                        )
                    })?;
                let contractor_cost =
                    check_amount("contractor_cost", contractor_cost, validate_non_negative_amount)?;
                Ok(Pricing {
                    pallet_quantity,
                    rate_per_pallet,
                    delivery_method,
                    contractor_name: Some(contractor_name),
                    contractor_cost,
                })
            }
        }
    }

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    pub async fn create_load_sheet(&self, input: NewLoadSheet) -> Result<LoadSheetView, ServiceError> {
        input.validate()?;
        let db = &*self.db;

        let company = company::Entity::find_by_id(input.company_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", input.company_id)))?;
        if company.status != RecordStatus::Active {
            return Err(ServiceError::ValidationError(format!(
                "Company {} is inactive",
                company.id
            )));
        }

        let status = input
            .status
            .as_deref()
            .map(parse_status)
            .transpose()?
            .unwrap_or(LoadSheetStatus::Draft);

        let pricing = self
            .resolve_pricing(
                input.pallet_quantity,
                input.rate_per_pallet.unwrap_or(company.rate_per_pallet),
                input.delivery_method.unwrap_or(DeliveryMethod::Own),
                input.contractor_id,
                input.contractor_name,
                input.contractor_cost.unwrap_or(Decimal::ZERO),
            )
            .await?;

        let model = load_sheet::ActiveModel {
            company_id: Set(company.id),
            pallet_quantity: Set(pricing.pallet_quantity),
            rate_per_pallet: Set(pricing.rate_per_pallet),
            cargo_description: Set(clean_optional(input.cargo_description)),
            delivery_method: Set(pricing.delivery_method),
            contractor_name: Set(pricing.contractor_name.clone()),
            contractor_cost: Set(pricing.contractor_cost),
            final_rate: Set(pricing.final_rate()?),
            status: Set(status),
            requested_date: Set(input.requested_date.unwrap_or_else(today)),
            ..Default::default()
        };

        let created = model.insert(db).await.map_err(ServiceError::db_error)?;
        info!(
            load_sheet_id = created.id,
            final_rate = %created.final_rate,
            "Load sheet created"
        );
        Ok(LoadSheetView::new(created, Some(company.name), None))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_load_sheet(
        &self,
        load_sheet_id: i32,
        changes: LoadSheetChanges,
    ) -> Result<LoadSheetView, ServiceError> {
        changes.validate()?;
        let db = &*self.db;
        let existing = self.find(load_sheet_id).await?;
        let invoice_id = self.invoice_id_for(load_sheet_id).await?;

        let current = Pricing::of(&existing);
        let touches_pricing = changes.pallet_quantity.is_some()
            || changes.rate_per_pallet.is_some()
            || changes.delivery_method.is_some()
            || changes.contractor_id.is_some()
            || changes.contractor_name.is_some()
            || changes.contractor_cost.is_some();

        let pricing = if touches_pricing {
            let delivery_method = changes.delivery_method.unwrap_or(current.delivery_method);
            let contractor_name = match (&changes.contractor_id, &changes.contractor_name) {
                (None, None) => current.contractor_name.clone(),
                _ => changes.contractor_name.clone(),
            };
            self.resolve_pricing(
                changes.pallet_quantity.unwrap_or(current.pallet_quantity),
                changes.rate_per_pallet.unwrap_or(current.rate_per_pallet),
                delivery_method,
                changes.contractor_id,
                contractor_name,
                changes.contractor_cost.unwrap_or(current.contractor_cost),
            )
            .await?
        } else {
            current.clone()
        };

        if pricing != current && invoice_id.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Load sheet {} has been invoiced; its pricing can no longer change",
                load_sheet_id
            )));
        }

        let status = match changes.status.as_deref() {
            Some(raw) => {
                let next = parse_status(raw)?;
                if !existing.status.can_transition_to(next) {
                    return Err(ServiceError::InvalidStatus(format!(
                        "Load sheet {} cannot move from {} to {}",
                        load_sheet_id,
                        existing.status.presented(),
                        next.presented()
                    )));
                }
                next
            }
            None => existing.status,
        };

        let mut model: load_sheet::ActiveModel = existing.clone().into();
        if pricing != current {
            model.pallet_quantity = Set(pricing.pallet_quantity);
            model.rate_per_pallet = Set(pricing.rate_per_pallet);
            model.delivery_method = Set(pricing.delivery_method);
            model.contractor_name = Set(pricing.contractor_name.clone());
            model.contractor_cost = Set(pricing.contractor_cost);
            model.final_rate = Set(pricing.final_rate()?);
        }
        if changes.cargo_description.is_some() {
            model.cargo_description = Set(clean_optional(changes.cargo_description));
        }
        if let Some(date) = changes.requested_date {
            model.requested_date = Set(date);
        }
        model.status = Set(status);

        let updated = model.update(db).await.map_err(ServiceError::db_error)?;
        info!(
            load_sheet_id,
            status = %updated.status,
            final_rate = %updated.final_rate,
            "Load sheet updated"
        );

        let company_name = self.company_names(&[updated.company_id]).await?;
        let name = company_name.get(&updated.company_id).cloned();
        Ok(LoadSheetView::new(updated, name, invoice_id))
    }

    pub(crate) async fn find(&self, load_sheet_id: i32) -> Result<load_sheet::Model, ServiceError> {
        load_sheet::Entity::find_by_id(load_sheet_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Load sheet {} not found", load_sheet_id)))
    }

    async fn invoice_id_for(&self, load_sheet_id: i32) -> Result<Option<i32>, ServiceError> {
        Ok(invoice::Entity::find()
            .filter(invoice::Column::LoadSheetId.eq(load_sheet_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .map(|inv| inv.id))
    }

    async fn company_names(&self, ids: &[i32]) -> Result<HashMap<i32, String>, ServiceError> {
        Ok(company::Entity::find()
            .filter(company::Column::Id.is_in(ids.to_vec()))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect())
    }

    /// Attaches company names and invoice ids to a batch of load sheets.
    pub(crate) async fn views(
        &self,
        sheets: Vec<load_sheet::Model>,
    ) -> Result<Vec<LoadSheetView>, ServiceError> {
        if sheets.is_empty() {
            return Ok(Vec::new());
        }
        let company_ids: Vec<i32> = sheets.iter().map(|s| s.company_id).collect();
        let sheet_ids: Vec<i32> = sheets.iter().map(|s| s.id).collect();

        let names = self.company_names(&company_ids).await?;
        let invoices: HashMap<i32, i32> = invoice::Entity::find()
            .filter(invoice::Column::LoadSheetId.is_in(sheet_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|inv| (inv.load_sheet_id, inv.id))
            .collect();

        Ok(sheets
            .into_iter()
            .map(|s| {
                let name = names.get(&s.company_id).cloned();
                let invoice_id = invoices.get(&s.id).copied();
                LoadSheetView::new(s, name, invoice_id)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_load_sheet(&self, load_sheet_id: i32) -> Result<LoadSheetView, ServiceError> {
        let sheet = self.find(load_sheet_id).await?;
        self.views(vec![sheet])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("Load sheet {} not found", load_sheet_id)))
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_load_sheets(
        &self,
        filter: LoadSheetFilter,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<LoadSheetView>, ServiceError> {
        let mut select = load_sheet::Entity::find()
            .order_by_desc(load_sheet::Column::CreatedAt)
            .order_by_desc(load_sheet::Column::Id);
        if let Some(company_id) = filter.company_id {
            select = select.filter(load_sheet::Column::CompanyId.eq(company_id));
        }
        if let Some(raw) = filter.status.as_deref() {
            select = select.filter(load_sheet::Column::Status.eq(parse_status(raw)?));
        }

        let page = paginate(&*self.db, select, pagination, |s| s).await?;
        let items = self.views(page.items).await?;
        Ok(PaginatedResponse {
            items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sheet(method: DeliveryMethod, cost: Decimal) -> load_sheet::Model {
        load_sheet::Model {
            id: 1,
            company_id: 2,
            pallet_quantity: 10,
            rate_per_pallet: dec!(120),
            cargo_description: None,
            delivery_method: method,
            contractor_name: Some("Swift Haulage".into()),
            contractor_cost: cost,
            final_rate: dec!(1200),
            status: LoadSheetStatus::Confirmed,
            requested_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn contractor_view_reports_net_profit() {
        let view = LoadSheetView::new(sheet(DeliveryMethod::Contractor, dec!(800)), None, None);
        assert_eq!(view.net_profit, Some(dec!(400.00)));
        assert_eq!(view.status, PresentedStatus::InProgress);
    }

    #[test]
    fn own_driver_view_has_no_profit() {
        let view = LoadSheetView::new(sheet(DeliveryMethod::Own, dec!(0)), None, Some(4));
        assert_eq!(view.net_profit, None);
        assert_eq!(view.invoice_id, Some(4));
    }

    #[test]
    fn status_accepts_both_vocabularies() {
        assert_eq!(parse_status("in_progress").unwrap(), LoadSheetStatus::Confirmed);
        assert_eq!(parse_status("draft").unwrap(), LoadSheetStatus::Draft);
        assert!(matches!(
            parse_status("shipped"),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn amounts_are_checked_and_rounded() {
        assert_eq!(
            check_amount("rate", dec!(12.345), validate_positive_amount).unwrap(),
            dec!(12.35)
        );
        assert!(check_amount("rate", dec!(0), validate_positive_amount).is_err());
        assert!(check_amount("cost", dec!(-1), validate_non_negative_amount).is_err());
    }
}
