//! Invoice and statement documents.
//!
//! Rendering turns a view model into HTML through tera; exporting writes the
//! rendered HTML somewhere retrievable. Exports are keyed by document number,
//! so exporting the same document twice overwrites the same artifact.

pub mod filesystem;
pub mod render;

use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

pub use filesystem::FileSystemExporter;
pub use render::{
    format_money, CompanyView, DocumentRenderer, InvoiceDocument, IssuerView, StatementDocument,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Statement,
}

impl DocumentKind {
    /// Stable artifact identifier, e.g. `invoice-INV202506001`.
    pub fn identifier(self, document_number: &str) -> String {
        format!("{}-{}", self, document_number)
    }
}

/// A rendered document ready to be exported or attached to an email.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub kind: DocumentKind,
    pub identifier: String,
    pub html: String,
}

impl RenderedDocument {
    pub fn file_name(&self) -> String {
        format!("{}.html", self.identifier)
    }
}

/// Where an exported document can be retrieved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExportedDocument {
    #[schema(example = "invoice-INV202506001")]
    pub identifier: String,
    /// Path of the artifact on the exporter's storage
    #[schema(example = "uploads/invoice-INV202506001.html")]
    pub location: String,
    #[schema(example = "http://localhost:8080/uploads/invoice-INV202506001.html")]
    pub url: String,
}

#[async_trait]
pub trait DocumentExporter: Send + Sync {
    /// Stores the document, replacing any earlier export with the same identifier.
    async fn export(&self, document: &RenderedDocument) -> Result<ExportedDocument, ServiceError>;
}
