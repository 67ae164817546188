//! Document numbers.
//!
//! Invoice numbers are `INV` + `YYYY` + `MM` + a three digit sequence scoped to
//! the invoice's own month. Statement numbers are never stored; they are
//! derived from the statement date and row id whenever one is shown.

use crate::{entities::invoice, errors::ServiceError};
use chrono::{Datelike, NaiveDate};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

pub const INVOICE_PREFIX: &str = "INV";
pub const STATEMENT_PREFIX: &str = "STMT";
pub const MAX_INVOICE_SEQUENCE: u32 = 999;

/// `INV202506` for any date in June 2025.
pub fn invoice_scope_prefix(scope_date: NaiveDate) -> String {
    format!(
        "{}{:04}{:02}",
        INVOICE_PREFIX,
        scope_date.year(),
        scope_date.month()
    )
}

pub fn format_invoice_number(scope_date: NaiveDate, sequence: u32) -> Result<String, ServiceError> {
    if sequence == 0 || sequence > MAX_INVOICE_SEQUENCE {
        return Err(ServiceError::SequenceExhausted(format!(
            "invoice sequence {} is outside 1..={} for {}",
            sequence,
            MAX_INVOICE_SEQUENCE,
            invoice_scope_prefix(scope_date)
        )));
    }
    Ok(format!("{}{:03}", invoice_scope_prefix(scope_date), sequence))
}

/// Extracts the sequence from a number that belongs to `prefix`'s scope.
pub fn parse_sequence(invoice_number: &str, prefix: &str) -> Option<u32> {
    let suffix = invoice_number.strip_prefix(prefix)?;
    if suffix.len() != 3 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Sequence that follows the highest number already issued in the scope.
pub fn following_sequence(highest_existing: Option<&str>, prefix: &str) -> u32 {
    highest_existing
        .and_then(|number| parse_sequence(number, prefix))
        .map(|seq| seq + 1)
        .unwrap_or(1)
}

/// Looks up the highest number issued for the month of `scope_date` and
/// returns the next one. The caller must still insert under a unique index and
/// retry on collision: two concurrent callers can observe the same maximum.
pub async fn next_invoice_number<C>(db: &C, scope_date: NaiveDate) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let prefix = invoice_scope_prefix(scope_date);
    let highest: Option<String> = invoice::Entity::find()
        .select_only()
        .column(invoice::Column::InvoiceNumber)
        .filter(invoice::Column::InvoiceNumber.starts_with(prefix.as_str()))
        .order_by_desc(invoice::Column::InvoiceNumber)
        .limit(1)
        .into_tuple()
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    format_invoice_number(scope_date, following_sequence(highest.as_deref(), &prefix))
}

/// `STMT` + statement year + month + id padded to three digits.
pub fn statement_number(statement_date: NaiveDate, statement_id: i32) -> String {
    format!(
        "{}{:04}{:02}{:03}",
        STATEMENT_PREFIX,
        statement_date.year(),
        statement_date.month(),
        statement_id
    )
}
