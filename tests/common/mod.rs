#![allow(dead_code)]

use std::{path::Path, sync::Arc};

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::NaiveDate;
use logistix_api::{
    config::AppConfig,
    db,
    documents::{DocumentRenderer, FileSystemExporter, IssuerView},
    handlers::AppServices,
    notifications::RecordingMailer,
    services::{
        companies::CompanyInput,
        invoicing::{BillingSettings, IssuedInvoice},
        load_sheets::{LoadSheetChanges, LoadSheetView, NewLoadSheet},
    },
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Application state backed by an in-memory SQLite database, a temporary
/// document directory and a mailer that records instead of sending.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: RecordingMailer,
    pub documents: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_, _| {}).await
    }

    /// Backs the app with an SQLite file so several pooled connections can
    /// write concurrently.
    pub async fn file_backed(max_connections: u32, invoice_number_attempts: u32) -> Self {
        Self::with_config(|cfg, dir| {
            cfg.database_url = format!("sqlite://{}?mode=rwc", dir.join("ledger.db").display());
            cfg.db_max_connections = max_connections;
            cfg.billing.invoice_number_attempts = invoice_number_attempts;
        })
        .await
    }

    pub async fn with_config(configure: impl FnOnce(&mut AppConfig, &Path)) -> Self {
        let documents = tempfile::tempdir().expect("temporary document directory");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.documents.output_dir = documents.path().to_string_lossy().into_owned();
        cfg.documents.public_base_url = "http://localhost:18080/uploads".to_string();
        configure(&mut cfg, documents.path());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let mailer = RecordingMailer::new();
        let renderer = Arc::new(
            DocumentRenderer::new(IssuerView::from(&cfg.documents), "R")
                .expect("document templates load"),
        );
        let exporter = Arc::new(FileSystemExporter::new(
            documents.path(),
            cfg.documents.public_base_url.clone(),
        ));
        let services = AppServices::new(
            db_arc.clone(),
            renderer,
            exporter,
            Arc::new(mailer.clone()),
            BillingSettings::from(&cfg.billing),
            cfg.billing.default_payment_terms,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            services,
        };
        let router = logistix_api::app_router(state.clone()).layer(axum::middleware::from_fn(
            logistix_api::middleware_helpers::request_id::request_id_middleware,
        ));

        Self {
            router,
            state,
            mailer,
            documents,
        }
    }

    /// Send a request against the router, optionally with a JSON body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_company(&self, name: &str, rate: Decimal, payment_terms: i32) -> i32 {
        self.state
            .services
            .companies
            .create_company(company_input(name, rate, payment_terms))
            .await
            .expect("seed company")
            .id
    }

    pub async fn seed_load_sheet(&self, company_id: i32, pallets: i32) -> LoadSheetView {
        self.state
            .services
            .load_sheets
            .create_load_sheet(new_load_sheet(company_id, pallets))
            .await
            .expect("seed load sheet")
    }

    /// Creates a load sheet and moves it through to `completed`.
    pub async fn seed_completed_load_sheet(&self, company_id: i32, pallets: i32) -> LoadSheetView {
        let sheet = self.seed_load_sheet(company_id, pallets).await;
        self.state
            .services
            .load_sheets
            .update_load_sheet(
                sheet.id,
                LoadSheetChanges {
                    status: Some("completed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("complete load sheet")
    }

    /// Completes a fresh load sheet and invoices it on `date`.
    pub async fn seed_invoice(&self, company_id: i32, pallets: i32, date: NaiveDate) -> IssuedInvoice {
        let sheet = self.seed_completed_load_sheet(company_id, pallets).await;
        self.state
            .services
            .invoicing
            .issue_invoice_on(sheet.id, date)
            .await
            .expect("seed invoice")
    }
}

pub fn company_input(name: &str, rate: Decimal, payment_terms: i32) -> CompanyInput {
    CompanyInput {
        name: name.to_string(),
        contact_person: "Thandi Mokoena".to_string(),
        email: "accounts@example.com".to_string(),
        phone: "021 555 0101".to_string(),
        billing_address: Some("12 Dock Road, Cape Town".to_string()),
        vat_number: Some("4123456789".to_string()),
        rate_per_pallet: rate,
        payment_terms: Some(payment_terms),
        status: None,
    }
}

pub fn new_load_sheet(company_id: i32, pallets: i32) -> NewLoadSheet {
    NewLoadSheet {
        company_id,
        pallet_quantity: pallets,
        rate_per_pallet: None,
        cargo_description: Some("Palletised tinned goods".to_string()),
        delivery_method: None,
        contractor_id: None,
        contractor_name: None,
        contractor_cost: None,
        status: None,
        requested_date: NaiveDate::from_ymd_opt(2025, 6, 2),
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
