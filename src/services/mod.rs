// Pure billing rules
pub mod billing;
pub mod numbering;

// Reference data
pub mod companies;
pub mod contractors;

// Billing workflows
pub mod invoicing;
pub mod load_sheets;
pub mod statements;

// Read models
pub mod dashboard;

use crate::{errors::ServiceError, PaginatedResponse};
use billing::MAX_AMOUNT;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, Select};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::ValidationError;

/// Calendar date used for "today" in billing decisions.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Page selection for list operations. Pages are 1-based.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    /// Clamps the page to at least 1 and the limit to `1..=max_limit`.
    pub fn clamped(self, max_limit: u64) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, max_limit.max(1)),
        }
    }
}

/// Runs `select` one page at a time and maps every row.
pub(crate) async fn paginate<'db, C, E, M, T, F>(
    db: &'db C,
    select: Select<E>,
    pagination: Pagination,
    map: F,
) -> Result<PaginatedResponse<T>, ServiceError>
where
    C: ConnectionTrait,
    E: EntityTrait<Model = M>,
    M: FromQueryResult + Sized + Send + Sync + 'db,
    F: FnMut(M) -> T,
{
    let paginator = select.paginate(db, pagination.limit);
    let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
    let rows = paginator
        .fetch_page(pagination.page.saturating_sub(1))
        .await
        .map_err(ServiceError::db_error)?;

    Ok(PaginatedResponse {
        items: rows.into_iter().map(map).collect(),
        total,
        page: pagination.page,
        limit: pagination.limit,
        total_pages: total.div_ceil(pagination.limit),
    })
}

fn validate_within_money_column(value: &Decimal) -> Result<(), ValidationError> {
    if *value > MAX_AMOUNT {
        let mut err = ValidationError::new("amount_too_large");
        err.message = Some(format!("must not exceed {}", MAX_AMOUNT).into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive_amount");
        err.message = Some("must be greater than zero".into());
        return Err(err);
    }
    validate_within_money_column(value)
}

pub(crate) fn validate_non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative_amount");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    validate_within_money_column(value)
}

/// Trims an optional text field, mapping blanks to `None`.
pub(crate) fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Syntactic email check shared by every send operation.
pub(crate) fn validate_recipient(address: &str) -> Result<String, ServiceError> {
    let trimmed = address.trim();
    if trimmed.is_empty() || !validator::validate_email(trimmed) {
        return Err(ServiceError::ValidationError(format!(
            "'{}' is not a valid email address",
            address
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pagination_is_clamped() {
        let p = Pagination::new(0, 500).clamped(100);
        assert_eq!((p.page, p.limit), (1, 100));
        let p = Pagination::new(3, 0).clamped(100);
        assert_eq!((p.page, p.limit), (3, 1));
    }

    #[test]
    fn amount_validators() {
        assert!(validate_positive_amount(&dec!(0.01)).is_ok());
        assert!(validate_positive_amount(&dec!(0)).is_err());
        assert!(validate_non_negative_amount(&dec!(0)).is_ok());
        assert!(validate_non_negative_amount(&dec!(-0.01)).is_err());
        assert!(validate_positive_amount(&dec!(9999999999.99)).is_ok());
        assert!(validate_positive_amount(&dec!(10000000000.00)).is_err());
        assert!(validate_non_negative_amount(&Decimal::MAX).is_err());
    }

    #[test]
    fn recipient_validation() {
        assert_eq!(
            validate_recipient("  accounts@client.co.za ").unwrap(),
            "accounts@client.co.za"
        );
        assert!(validate_recipient("accounts@").is_err());
        assert!(validate_recipient("").is_err());
        assert!(validate_recipient("two words@client.test").is_err());
    }

    #[test]
    fn blank_optionals_become_none() {
        assert_eq!(clean_optional(Some("  ".into())), None);
        assert_eq!(clean_optional(Some(" VAT1 ".into())), Some("VAT1".into()));
        assert_eq!(clean_optional(None), None);
    }
}
