//! Stored enumerations and the mappings between stored and presented vocabularies.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Active/inactive flag shared by companies and contractors.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

impl Default for RecordStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryMethod {
    /// Delivered by the operator's own driver.
    #[sea_orm(string_value = "own")]
    #[strum(to_string = "own", serialize = "own_driver")]
    #[serde(alias = "own_driver")]
    Own,
    #[sea_orm(string_value = "contractor")]
    Contractor,
}

/// Load sheet status as stored.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoadSheetStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// Load sheet status as shown to API and CLI callers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PresentedStatus {
    Pending,
    InProgress,
    Completed,
}

impl From<LoadSheetStatus> for PresentedStatus {
    fn from(status: LoadSheetStatus) -> Self {
        match status {
            LoadSheetStatus::Draft => PresentedStatus::Pending,
            LoadSheetStatus::Confirmed => PresentedStatus::InProgress,
            LoadSheetStatus::Completed => PresentedStatus::Completed,
        }
    }
}

impl From<PresentedStatus> for LoadSheetStatus {
    fn from(status: PresentedStatus) -> Self {
        match status {
            PresentedStatus::Pending => LoadSheetStatus::Draft,
            PresentedStatus::InProgress => LoadSheetStatus::Confirmed,
            PresentedStatus::Completed => LoadSheetStatus::Completed,
        }
    }
}

impl LoadSheetStatus {
    /// Parses either vocabulary (`draft`/`confirmed`/`completed` or
    /// `pending`/`in_progress`/`completed`). Unknown values are rejected.
    pub fn parse_any(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        normalized
            .parse::<LoadSheetStatus>()
            .ok()
            .or_else(|| normalized.parse::<PresentedStatus>().ok().map(Into::into))
    }

    /// Forward-only lifecycle. Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: LoadSheetStatus) -> bool {
        use LoadSheetStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Draft, Confirmed) | (Draft, Completed) => true,
            (Confirmed, Completed) => true,
            _ => false,
        }
    }

    pub fn presented(self) -> PresentedStatus {
        self.into()
    }
}

/// Stored invoice payment status. Overdue is never stored, see [`InvoiceDisplayStatus`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceDisplayStatus {
    Pending,
    Paid,
    Overdue,
}

impl InvoiceDisplayStatus {
    /// Overdue means still pending with a due date strictly before `today`.
    pub fn derive(status: PaymentStatus, due_date: Date, today: Date) -> Self {
        match status {
            PaymentStatus::Paid => InvoiceDisplayStatus::Paid,
            PaymentStatus::Pending if due_date < today => InvoiceDisplayStatus::Overdue,
            PaymentStatus::Pending => InvoiceDisplayStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sea_orm::Iterable;

    #[test]
    fn stored_and_presented_statuses_round_trip() {
        for stored in LoadSheetStatus::iter() {
            let presented: PresentedStatus = stored.into();
            assert_eq!(LoadSheetStatus::from(presented), stored);
        }
        assert_eq!(
            PresentedStatus::from(LoadSheetStatus::Confirmed),
            PresentedStatus::InProgress
        );
        assert_eq!(PresentedStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn parse_any_accepts_both_vocabularies_and_rejects_unknown() {
        assert_eq!(LoadSheetStatus::parse_any("draft"), Some(LoadSheetStatus::Draft));
        assert_eq!(
            LoadSheetStatus::parse_any("in_progress"),
            Some(LoadSheetStatus::Confirmed)
        );
        assert_eq!(
            LoadSheetStatus::parse_any("Pending"),
            Some(LoadSheetStatus::Draft)
        );
        assert_eq!(
            LoadSheetStatus::parse_any("completed"),
            Some(LoadSheetStatus::Completed)
        );
        assert_eq!(LoadSheetStatus::parse_any("invoiced"), None);
        assert_eq!(LoadSheetStatus::parse_any(""), None);
    }

    #[test]
    fn transitions_only_move_forward() {
        use LoadSheetStatus::*;
        assert!(Draft.can_transition_to(Confirmed));
        assert!(Draft.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Draft));
        assert!(!Completed.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Draft));
    }

    #[test]
    fn delivery_method_accepts_own_driver_alias() {
        assert_eq!("own_driver".parse::<DeliveryMethod>().ok(), Some(DeliveryMethod::Own));
        let parsed: DeliveryMethod = serde_json::from_str("\"own_driver\"").unwrap();
        assert_eq!(parsed, DeliveryMethod::Own);
        assert_eq!(DeliveryMethod::Own.to_string(), "own");
    }

    #[test]
    fn overdue_is_derived_from_due_date() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        assert_eq!(
            InvoiceDisplayStatus::derive(PaymentStatus::Pending, yesterday, today),
            InvoiceDisplayStatus::Overdue
        );
        assert_eq!(
            InvoiceDisplayStatus::derive(PaymentStatus::Pending, today, today),
            InvoiceDisplayStatus::Pending
        );
        assert_eq!(
            InvoiceDisplayStatus::derive(PaymentStatus::Paid, yesterday, today),
            InvoiceDisplayStatus::Paid
        );
    }
}
