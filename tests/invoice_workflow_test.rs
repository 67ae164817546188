//! Invoice issuance, numbering, payment and email delivery against a real
//! (in-memory SQLite) store.

mod common;

use assert_matches::assert_matches;
use common::{date, TestApp};
use logistix_api::{
    entities::{invoice, InvoiceDisplayStatus, PaymentStatus},
    errors::ServiceError,
    services::{invoicing::InvoiceFilter, load_sheets::LoadSheetChanges, Pagination},
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, Set};

#[tokio::test]
async fn issues_invoice_with_vat_terms_and_document() {
    let app = TestApp::new().await;
    let company = app.seed_company("Cape Fresh Produce", dec!(250.00), 30).await;
    let sheet = app.seed_completed_load_sheet(company, 4).await;
    assert_eq!(sheet.final_rate, dec!(1000.00));

    let issued = app
        .state
        .services
        .invoicing
        .issue_invoice_on(sheet.id, date(2025, 6, 10))
        .await
        .expect("invoice issued");

    assert_eq!(issued.invoice_number, "INV202506001");
    assert_eq!(issued.total_amount, dec!(1150.00));
    assert_eq!(issued.due_date, date(2025, 7, 10));

    let document = issued.document.expect("document exported");
    assert_eq!(document.identifier, "invoice-INV202506001");
    assert_eq!(
        document.url,
        "http://localhost:18080/uploads/invoice-INV202506001.html"
    );
    let html = std::fs::read_to_string(app.documents.path().join("invoice-INV202506001.html"))
        .expect("exported document on disk");
    assert!(html.contains("INV202506001"));
    assert!(html.contains("Cape Fresh Produce"));

    let view = app
        .state
        .services
        .invoicing
        .get_invoice(issued.id)
        .await
        .expect("invoice fetched");
    assert_eq!(view.subtotal, dec!(1000.00));
    assert_eq!(view.vat_amount, dec!(150.00));
    assert_eq!(view.vat_rate, dec!(15));
    assert_eq!(view.payment_status, PaymentStatus::Pending);
    assert_eq!(view.load_sheet_id, sheet.id);
    assert_eq!(view.company_name.as_deref(), Some("Cape Fresh Produce"));
}

#[tokio::test]
async fn numbers_restart_each_month_and_increase_within_it() {
    let app = TestApp::new().await;
    let company = app.seed_company("Karoo Mills", dec!(100.00), 30).await;

    let first = app.seed_invoice(company, 1, date(2025, 6, 3)).await;
    let second = app.seed_invoice(company, 2, date(2025, 6, 28)).await;
    let july = app.seed_invoice(company, 1, date(2025, 7, 1)).await;
    let back_in_june = app.seed_invoice(company, 1, date(2025, 6, 30)).await;

    assert_eq!(first.invoice_number, "INV202506001");
    assert_eq!(second.invoice_number, "INV202506002");
    assert_eq!(july.invoice_number, "INV202507001");
    assert_eq!(back_in_june.invoice_number, "INV202506003");
}

#[tokio::test]
async fn a_load_sheet_is_invoiced_at_most_once() {
    let app = TestApp::new().await;
    let company = app.seed_company("Boland Wines", dec!(300.00), 14).await;
    let sheet = app.seed_completed_load_sheet(company, 2).await;
    let invoicing = &app.state.services.invoicing;

    invoicing
        .issue_invoice_on(sheet.id, date(2025, 6, 5))
        .await
        .expect("first invoice");
    let err = invoicing
        .issue_invoice_on(sheet.id, date(2025, 6, 6))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let all = invoicing
        .list_invoices(InvoiceFilter::default(), Pagination::default())
        .await
        .expect("list invoices");
    assert_eq!(all.total, 1);
}

#[tokio::test]
async fn unfinished_or_missing_load_sheets_cannot_be_invoiced() {
    let app = TestApp::new().await;
    let company = app.seed_company("Overberg Grain", dec!(180.00), 30).await;
    let draft = app.seed_load_sheet(company, 3).await;
    let invoicing = &app.state.services.invoicing;

    let err = invoicing
        .issue_invoice_on(draft.id, date(2025, 6, 5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    let err = invoicing
        .issue_invoice_on(9_999, date(2025, 6, 5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn invoiced_load_sheet_pricing_is_frozen() {
    let app = TestApp::new().await;
    let company = app.seed_company("Garden Route Timber", dec!(200.00), 30).await;
    let issued = app.seed_invoice(company, 5, date(2025, 6, 12)).await;
    let invoice = app
        .state
        .services
        .invoicing
        .get_invoice(issued.id)
        .await
        .expect("invoice");

    let err = app
        .state
        .services
        .load_sheets
        .update_load_sheet(
            invoice.load_sheet_id,
            LoadSheetChanges {
                pallet_quantity: Some(6),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let edited = app
        .state
        .services
        .load_sheets
        .update_load_sheet(
            invoice.load_sheet_id,
            LoadSheetChanges {
                cargo_description: Some("Pine planks".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("non-pricing edits are allowed");
    assert_eq!(edited.cargo_description.as_deref(), Some("Pine planks"));
    assert_eq!(edited.invoice_id, Some(issued.id));
}

#[tokio::test]
async fn marking_paid_is_idempotent() {
    let app = TestApp::new().await;
    let company = app.seed_company("West Coast Fisheries", dec!(150.00), 30).await;
    let issued = app.seed_invoice(company, 2, date(2025, 6, 1)).await;
    let invoicing = &app.state.services.invoicing;

    let paid = invoicing
        .mark_invoice_paid_on(issued.id, date(2025, 6, 20))
        .await
        .expect("marked paid");
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, InvoiceDisplayStatus::Paid);
    assert_eq!(paid.payment_date, Some(date(2025, 6, 20)));

    let again = invoicing
        .mark_invoice_paid_on(issued.id, date(2025, 6, 25))
        .await
        .expect("second call succeeds");
    assert_eq!(again.payment_date, Some(date(2025, 6, 20)));

    let err = invoicing.mark_invoice_paid(9_999).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn status_filter_derives_overdue_from_due_date() {
    let app = TestApp::new().await;
    let company = app.seed_company("Highveld Steel", dec!(400.00), 30).await;
    let late = app.seed_invoice(company, 1, date(2025, 5, 1)).await;
    let current = app.seed_invoice(company, 1, date(2025, 6, 1)).await;
    let settled = app.seed_invoice(company, 1, date(2025, 5, 2)).await;
    let invoicing = &app.state.services.invoicing;
    invoicing
        .mark_invoice_paid_on(settled.id, date(2025, 5, 20))
        .await
        .expect("paid");

    let today = date(2025, 6, 15);
    let list = |status| {
        invoicing.list_invoices_on(
            InvoiceFilter {
                company_id: Some(company),
                status: Some(status),
            },
            Pagination::default(),
            today,
        )
    };

    let overdue = list(InvoiceDisplayStatus::Overdue).await.expect("overdue");
    assert_eq!(overdue.items.len(), 1);
    assert_eq!(overdue.items[0].id, late.id);
    assert_eq!(overdue.items[0].status, InvoiceDisplayStatus::Overdue);
    assert_eq!(overdue.items[0].payment_status, PaymentStatus::Pending);

    let pending = list(InvoiceDisplayStatus::Pending).await.expect("pending");
    assert_eq!(pending.items.len(), 1);
    assert_eq!(pending.items[0].id, current.id);

    let paid = list(InvoiceDisplayStatus::Paid).await.expect("paid");
    assert_eq!(paid.items.len(), 1);
    assert_eq!(paid.items[0].id, settled.id);
}

#[tokio::test]
async fn email_attaches_document_and_stamps_delivery() {
    let app = TestApp::new().await;
    let company = app.seed_company("Namaqua Minerals", dec!(500.00), 30).await;
    let issued = app.seed_invoice(company, 2, date(2025, 6, 9)).await;

    let view = app
        .state
        .services
        .invoicing
        .send_invoice_email(issued.id, "  finance@namaqua.test ")
        .await
        .expect("email sent");
    assert_eq!(view.email_sent_to.as_deref(), Some("finance@namaqua.test"));
    assert!(view.email_sent_date.is_some());

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "finance@namaqua.test");
    assert!(sent[0].subject.contains("INV202506001"));
    let attachment = sent[0].attachment.as_ref().expect("document attached");
    assert_eq!(attachment.file_name, "invoice-INV202506001.html");
    assert!(String::from_utf8_lossy(&attachment.content).contains("INV202506001"));
}

#[tokio::test]
async fn failed_email_leaves_invoice_unstamped() {
    let app = TestApp::new().await;
    let company = app.seed_company("Lowveld Citrus", dec!(220.00), 30).await;
    let issued = app.seed_invoice(company, 1, date(2025, 6, 9)).await;
    let invoicing = &app.state.services.invoicing;

    app.mailer.fail_with(Some("relay unreachable"));
    let err = invoicing
        .send_invoice_email(issued.id, "accounts@lowveld.test")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::TransportError(_));
    assert!(err.is_retryable());

    let view = invoicing.get_invoice(issued.id).await.expect("invoice");
    assert!(view.email_sent_to.is_none());
    assert!(view.email_sent_date.is_none());

    let err = invoicing
        .send_invoice_email(issued.id, "not-an-address")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn re_export_overwrites_the_same_document() {
    let app = TestApp::new().await;
    let company = app.seed_company("Drakensberg Dairy", dec!(90.00), 30).await;
    let issued = app.seed_invoice(company, 3, date(2025, 6, 9)).await;

    let first = issued.document.expect("exported on issue");
    let second = app
        .state
        .services
        .invoicing
        .export_invoice(issued.id)
        .await
        .expect("re-exported");
    assert_eq!(first, second);

    let html_files = std::fs::read_dir(app.documents.path())
        .expect("document dir")
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().map(|x| x == "html").unwrap_or(false))
        .count();
    assert_eq!(html_files, 1);
}

#[tokio::test]
async fn dashboard_counts_overdue_inside_outstanding_once() {
    let app = TestApp::new().await;
    let company = app.seed_company("Karoo Mills", dec!(100.00), 30).await;
    let late = app.seed_invoice(company, 1, date(2025, 5, 1)).await;
    let current = app.seed_invoice(company, 1, date(2025, 6, 1)).await;
    let settled = app.seed_invoice(company, 1, date(2025, 5, 2)).await;
    app.state
        .services
        .invoicing
        .mark_invoice_paid_on(settled.id, date(2025, 5, 20))
        .await
        .expect("paid");

    let summary = app
        .state
        .services
        .dashboard
        .summary_on(date(2025, 6, 15))
        .await
        .expect("summary");
    assert_eq!(summary.invoices_this_month, 1);
    assert_eq!(summary.outstanding_balance, dec!(230.00));
    assert_eq!(summary.overdue_count, 1);
    assert_eq!(summary.overdue_balance, dec!(115.00));
    assert_eq!(summary.active_companies, 1);
    assert_eq!(summary.recent_load_sheets.len(), 3);
    let pending: Vec<_> = summary.pending_invoices.iter().map(|i| i.id).collect();
    assert_eq!(pending, vec![late.id, current.id]);
    assert_eq!(summary.pending_invoices[0].status, InvoiceDisplayStatus::Overdue);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issues_get_unique_consecutive_numbers() {
    const SHEETS: usize = 8;
    // Every lost race means another caller won, so one attempt per caller is enough.
    let app = TestApp::file_backed(4, SHEETS as u32).await;
    let company = app.seed_company("Cape Fresh Produce", dec!(250.00), 30).await;

    let mut sheets = Vec::new();
    for _ in 0..SHEETS {
        sheets.push(app.seed_completed_load_sheet(company, 1).await.id);
    }

    let handles: Vec<_> = sheets
        .into_iter()
        .map(|sheet| {
            let invoicing = app.state.services.invoicing.clone();
            tokio::spawn(async move { invoicing.issue_invoice_on(sheet, date(2025, 6, 10)).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task").expect("invoice issued");
    }

    let numbers: Vec<String> = invoice::Entity::find()
        .order_by_asc(invoice::Column::Id)
        .all(&*app.state.db)
        .await
        .expect("invoices")
        .into_iter()
        .map(|inv| inv.invoice_number)
        .collect();
    let expected: Vec<String> = (1..=SHEETS).map(|n| format!("INV202506{:03}", n)).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_issues_for_one_load_sheet_create_a_single_invoice() {
    let app = TestApp::file_backed(4, 5).await;
    let company = app.seed_company("Boland Wines", dec!(300.00), 30).await;
    let sheet = app.seed_completed_load_sheet(company, 2).await.id;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let invoicing = app.state.services.invoicing.clone();
            tokio::spawn(async move { invoicing.issue_invoice_on(sheet, date(2025, 6, 10)).await })
        })
        .collect();

    let mut issued = 0;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(_) => issued += 1,
            Err(err) => assert_matches!(err, ServiceError::Conflict(_)),
        }
    }
    assert_eq!(issued, 1);
    let rows = invoice::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn a_full_month_of_numbers_is_exhausted_not_wrapped() {
    let app = TestApp::new().await;
    let company = app.seed_company("Overberg Grain", dec!(180.00), 30).await;
    let last = app.seed_invoice(company, 1, date(2025, 6, 2)).await;

    let mut model: invoice::ActiveModel = invoice::Entity::find_by_id(last.id)
        .one(&*app.state.db)
        .await
        .expect("lookup")
        .expect("seeded invoice")
        .into();
    model.invoice_number = Set("INV202506999".to_string());
    model.update(&*app.state.db).await.expect("renumber");

    let sheet = app.seed_completed_load_sheet(company, 1).await;
    let invoicing = &app.state.services.invoicing;
    let err = invoicing
        .issue_invoice_on(sheet.id, date(2025, 6, 20))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::SequenceExhausted(_));
    let rows = invoice::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count");
    assert_eq!(rows, 1);

    let july = invoicing
        .issue_invoice_on(sheet.id, date(2025, 7, 1))
        .await
        .expect("next month has room");
    assert_eq!(july.invoice_number, "INV202507001");
}
