//! Billing arithmetic. Everything here is pure; callers pass in every rate
//! they want applied (VAT is never read from global state).

use crate::{
    entities::{invoice, PaymentStatus},
    errors::ServiceError,
};
use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Largest amount a `DECIMAL(12,2)` money column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

fn out_of_range(what: &str) -> ServiceError {
    ServiceError::ValidationError(format!("{} exceeds the maximum amount of {}", what, MAX_AMOUNT))
}

/// Rounds to cents, half away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Pallet count times rate, unrounded. Fails when the product no longer
/// fits a money column.
pub fn load_sheet_subtotal(
    pallet_quantity: i32,
    rate_per_pallet: Decimal,
) -> Result<Decimal, ServiceError> {
    Decimal::from(pallet_quantity)
        .checked_mul(rate_per_pallet)
        .filter(|subtotal| subtotal.abs() <= MAX_AMOUNT)
        .ok_or_else(|| out_of_range("Load sheet subtotal"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VatBreakdown {
    pub vat_amount: Decimal,
    pub total: Decimal,
}

/// `vat_amount = round(subtotal * rate / 100)`, `total = subtotal + vat_amount`.
pub fn apply_vat(subtotal: Decimal, vat_rate_percent: Decimal) -> Result<VatBreakdown, ServiceError> {
    let vat_amount = subtotal
        .checked_mul(vat_rate_percent)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .map(round_currency)
        .ok_or_else(|| out_of_range("VAT amount"))?;
    let total = subtotal
        .checked_add(vat_amount)
        .map(round_currency)
        .filter(|total| total.abs() <= MAX_AMOUNT)
        .ok_or_else(|| out_of_range("Invoice total"))?;
    Ok(VatBreakdown { vat_amount, total })
}

/// Margin left on a contractor job. Informational only, never persisted.
pub fn contractor_profit(subtotal: Decimal, contractor_cost: Decimal) -> Decimal {
    subtotal - contractor_cost
}

pub fn due_date(invoice_date: NaiveDate, payment_terms_days: i32) -> NaiveDate {
    invoice_date + Duration::days(i64::from(payment_terms_days))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatementTotals {
    pub opening_balance: Decimal,
    pub total_charges: Decimal,
    pub total_payments: Decimal,
    pub closing_balance: Decimal,
    pub invoice_count: i32,
}

/// Folds a period's invoices onto the prior closing balance.
///
/// Every invoice counts toward charges, paid ones count toward payments as
/// well, so a paid invoice nets to zero on the closing balance.
pub fn statement_rollup(invoices: &[invoice::Model], prior_closing: Decimal) -> StatementTotals {
    let (charges, payments) =
        invoices
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(charges, payments), inv| {
                let paid = if inv.payment_status == PaymentStatus::Paid {
                    inv.total_amount
                } else {
                    Decimal::ZERO
                };
                (charges + inv.total_amount, payments + paid)
            });

    let opening_balance = round_currency(prior_closing);
    let total_charges = round_currency(charges);
    let total_payments = round_currency(payments);
    StatementTotals {
        opening_balance,
        total_charges,
        total_payments,
        closing_balance: round_currency(opening_balance + total_charges - total_payments),
        invoice_count: invoices.len() as i32,
    }
}
