//! Monthly statement generation and balance carry-forward.

mod common;

use assert_matches::assert_matches;
use common::{date, TestApp};
use logistix_api::{
    entities::PaymentStatus,
    errors::ServiceError,
    services::{
        statements::{StatementFilter, StatementPeriod},
        Pagination,
    },
};
use rust_decimal_macros::dec;

fn period(raw: &str) -> StatementPeriod {
    raw.parse().expect("valid period")
}

#[tokio::test]
async fn rolls_up_month_and_carries_closing_balance_forward() {
    let app = TestApp::new().await;
    let company = app.seed_company("Cape Fresh Produce", dec!(250.00), 30).await;

    // June: 1150.00 paid, 575.00 outstanding
    let paid = app.seed_invoice(company, 4, date(2025, 6, 10)).await;
    let outstanding = app.seed_invoice(company, 2, date(2025, 6, 3)).await;
    app.state
        .services
        .invoicing
        .mark_invoice_paid_on(paid.id, date(2025, 6, 25))
        .await
        .expect("paid");

    // July: 287.50 outstanding
    app.seed_invoice(company, 1, date(2025, 7, 14)).await;

    let statements = &app.state.services.statements;
    let june = statements
        .generate_statement_on(company, period("2025-06"), date(2025, 7, 1))
        .await
        .expect("june statement")
        .statement;
    assert_eq!(june.statement_period, "2025-06");
    assert_eq!(june.period_label, "June 2025");
    assert_eq!(june.opening_balance, dec!(0.00));
    assert_eq!(june.total_charges, dec!(1725.00));
    assert_eq!(june.total_payments, dec!(1150.00));
    assert_eq!(june.closing_balance, dec!(575.00));
    assert_eq!(june.invoice_count, 2);
    assert_eq!(june.statement_number, format!("STMT202507{:03}", june.id));

    let july = statements
        .generate_statement_on(company, period("2025-07"), date(2025, 8, 1))
        .await
        .expect("july statement")
        .statement;
    assert_eq!(july.opening_balance, dec!(575.00));
    assert_eq!(july.total_charges, dec!(287.50));
    assert_eq!(july.total_payments, dec!(0.00));
    assert_eq!(july.closing_balance, dec!(862.50));
    assert_eq!(july.invoice_count, 1);

    let details = statements
        .get_statement_details(june.id)
        .await
        .expect("details");
    let numbers: Vec<_> = details
        .items
        .iter()
        .map(|item| item.invoice_id)
        .collect();
    assert_eq!(numbers, vec![outstanding.id, paid.id]);
    assert_eq!(details.items[1].payment_status, PaymentStatus::Paid);
    assert_eq!(details.items[1].payment_date, Some(date(2025, 6, 25)));
    assert_eq!(details.items[0].amount, dec!(575.00));
}

#[tokio::test]
async fn opening_balance_is_zero_without_a_previous_statement() {
    let app = TestApp::new().await;
    let company = app.seed_company("Karoo Mills", dec!(100.00), 30).await;
    app.seed_invoice(company, 2, date(2025, 5, 20)).await;
    app.seed_invoice(company, 3, date(2025, 6, 2)).await;

    // May is never stated, so June starts from zero.
    let june = app
        .state
        .services
        .statements
        .generate_statement_on(company, period("202506"), date(2025, 7, 1))
        .await
        .expect("statement")
        .statement;
    assert_eq!(june.opening_balance, dec!(0.00));
    assert_eq!(june.total_charges, dec!(345.00));
    assert_eq!(june.closing_balance, dec!(345.00));
}

#[tokio::test]
async fn items_are_snapshots_taken_at_generation() {
    let app = TestApp::new().await;
    let company = app.seed_company("Boland Wines", dec!(300.00), 30).await;
    let issued = app.seed_invoice(company, 1, date(2025, 6, 4)).await;

    let statements = &app.state.services.statements;
    let generated = statements
        .generate_statement_on(company, period("2025-06"), date(2025, 7, 1))
        .await
        .expect("statement");

    app.state
        .services
        .invoicing
        .mark_invoice_paid_on(issued.id, date(2025, 7, 3))
        .await
        .expect("paid later");

    let details = statements
        .get_statement_details(generated.statement.id)
        .await
        .expect("details");
    assert_eq!(details.items[0].payment_status, PaymentStatus::Pending);
    assert_eq!(details.items[0].payment_date, None);
    assert_eq!(details.statement.closing_balance, dec!(345.00));
}

#[tokio::test]
async fn generation_rejects_duplicates_empty_months_and_unknown_companies() {
    let app = TestApp::new().await;
    let company = app.seed_company("Overberg Grain", dec!(180.00), 30).await;
    app.seed_invoice(company, 1, date(2025, 6, 4)).await;
    let statements = &app.state.services.statements;

    statements
        .generate_statement_on(company, period("2025-06"), date(2025, 7, 1))
        .await
        .expect("first statement");

    let err = statements
        .generate_statement_on(company, period("2025-06"), date(2025, 7, 2))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let err = statements
        .generate_statement_on(company, period("2025-08"), date(2025, 9, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NothingToBill(_));

    let err = statements
        .generate_statement_on(9_999, period("2025-06"), date(2025, 7, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let listed = statements
        .list_statements(
            StatementFilter {
                company_id: Some(company),
            },
            Pagination::default(),
        )
        .await
        .expect("list");
    assert_eq!(listed.total, 1);
}

#[tokio::test]
async fn statement_email_is_sent_once_the_transport_accepts_it() {
    let app = TestApp::new().await;
    let company = app.seed_company("Namaqua Minerals", dec!(500.00), 30).await;
    app.seed_invoice(company, 1, date(2025, 6, 4)).await;
    let statements = &app.state.services.statements;
    let generated = statements
        .generate_statement_on(company, period("2025-06"), date(2025, 7, 1))
        .await
        .expect("statement");
    let id = generated.statement.id;
    assert!(generated.document.is_some());
    assert!(!generated.statement.email_sent);

    app.mailer.fail_with(Some("relay unreachable"));
    let err = statements
        .send_statement_email(id, "finance@namaqua.test")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::TransportError(_));
    let unchanged = statements.get_statement_details(id).await.expect("details");
    assert!(!unchanged.statement.email_sent);

    app.mailer.fail_with(None);
    let sent = statements
        .send_statement_email(id, "finance@namaqua.test")
        .await
        .expect("sent");
    assert!(sent.email_sent);
    assert!(sent.email_sent_date.is_some());

    let outbox = app.mailer.sent();
    assert_eq!(outbox.len(), 1);
    assert!(outbox[0].subject.starts_with("Monthly Statement STMT202507"));
    assert!(outbox[0].subject.ends_with("Namaqua Minerals"));
    assert!(outbox[0].attachment.is_some());
}

#[test]
fn periods_parse_both_spellings_and_reject_garbage() {
    assert_eq!(period("2025-06"), period("202506"));
    assert_eq!(period("2025-01").previous(), period("2024-12"));
    assert!("2025-13".parse::<StatementPeriod>().is_err());
    assert!("June".parse::<StatementPeriod>().is_err());
}
