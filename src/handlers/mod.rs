pub mod companies;
pub mod contractors;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod load_sheets;
pub mod statements;

use crate::{
    config::{AppConfig, SmtpConfig},
    db::DbPool,
    documents::{DocumentExporter, DocumentRenderer, FileSystemExporter},
    errors::ServiceError,
    notifications::{DisabledMailer, MailTransport, SmtpMailer},
    services::{
        companies::CompanyService, contractors::ContractorService, dashboard::DashboardService,
        invoicing::{BillingSettings, InvoicingService},
        load_sheets::LoadSheetService,
        statements::StatementService,
    },
};
use std::sync::Arc;
use tracing::{info, warn};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub companies: Arc<CompanyService>,
    pub contractors: Arc<ContractorService>,
    pub load_sheets: Arc<LoadSheetService>,
    pub invoicing: Arc<InvoicingService>,
    pub statements: Arc<StatementService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        renderer: Arc<DocumentRenderer>,
        exporter: Arc<dyn DocumentExporter>,
        mailer: Arc<dyn MailTransport>,
        settings: BillingSettings,
        default_payment_terms: i32,
    ) -> Self {
        Self {
            companies: Arc::new(CompanyService::new(db_pool.clone(), default_payment_terms)),
            contractors: Arc::new(ContractorService::new(db_pool.clone())),
            load_sheets: Arc::new(LoadSheetService::new(db_pool.clone())),
            invoicing: Arc::new(InvoicingService::new(
                db_pool.clone(),
                renderer.clone(),
                exporter.clone(),
                mailer.clone(),
                settings,
            )),
            statements: Arc::new(StatementService::new(
                db_pool.clone(),
                renderer,
                exporter,
                mailer,
            )),
            dashboard: Arc::new(DashboardService::new(db_pool)),
        }
    }

    /// Wires the document renderer, filesystem exporter and mail transport
    /// described by `cfg`.
    pub fn from_config(db_pool: Arc<DbPool>, cfg: &AppConfig) -> Result<Self, ServiceError> {
        let renderer = Arc::new(DocumentRenderer::from_config(&cfg.documents)?);
        let exporter: Arc<dyn DocumentExporter> =
            Arc::new(FileSystemExporter::from_config(&cfg.documents));
        let mailer = build_mailer(&cfg.smtp)?;

        Ok(Self::new(
            db_pool,
            renderer,
            exporter,
            mailer,
            BillingSettings::from(&cfg.billing),
            cfg.billing.default_payment_terms,
        ))
    }
}

pub fn build_mailer(cfg: &SmtpConfig) -> Result<Arc<dyn MailTransport>, ServiceError> {
    if cfg.enabled {
        info!(host = %cfg.host, "Email delivery enabled");
        Ok(Arc::new(SmtpMailer::from_config(cfg)?))
    } else {
        warn!("SMTP disabled; email sends will fail until smtp.enabled = true");
        Ok(Arc::new(DisabledMailer))
    }
}
