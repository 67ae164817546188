use super::{DocumentExporter, ExportedDocument, RenderedDocument};
use crate::{config::DocumentsConfig, errors::ServiceError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes documents as `<output_dir>/<identifier>.html`.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// reader never sees a half-written document and re-exports replace it whole.
#[derive(Debug, Clone)]
pub struct FileSystemExporter {
    output_dir: PathBuf,
    public_base_url: String,
}

impl FileSystemExporter {
    pub fn new(output_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &DocumentsConfig) -> Self {
        Self::new(&cfg.output_dir, cfg.public_base_url.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn describe(&self, file_name: &str, identifier: &str) -> ExportedDocument {
        ExportedDocument {
            identifier: identifier.to_string(),
            location: self.output_dir.join(file_name).to_string_lossy().into_owned(),
            url: format!("{}/{}", self.public_base_url, file_name),
        }
    }
}

fn export_error(action: &str, path: &Path, err: std::io::Error) -> ServiceError {
    ServiceError::ExportError(format!("Failed to {} {}: {}", action, path.display(), err))
}

#[async_trait]
impl DocumentExporter for FileSystemExporter {
    async fn export(&self, document: &RenderedDocument) -> Result<ExportedDocument, ServiceError> {
        let file_name = document.file_name();
        let target = self.output_dir.join(&file_name);
        let staging = self
            .output_dir
            .join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| export_error("create", &self.output_dir, e))?;

        debug!(path = %staging.display(), "Writing document");
        tokio::fs::write(&staging, document.html.as_bytes())
            .await
            .map_err(|e| export_error("write", &staging, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(export_error("move", &target, e));
        }

        info!(kind = %document.kind, identifier = %document.identifier, "Document exported");
        Ok(self.describe(&file_name, &document.identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentKind;

    fn document(html: &str) -> RenderedDocument {
        RenderedDocument {
            kind: DocumentKind::Invoice,
            identifier: "invoice-INV202506001".into(),
            html: html.into(),
        }
    }

    #[tokio::test]
    async fn re_export_overwrites_same_location() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileSystemExporter::new(dir.path().join("uploads"), "http://docs.test/uploads/");

        let first = exporter.export(&document("<p>v1</p>")).await.unwrap();
        let second = exporter.export(&document("<p>v2</p>")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.url,
            "http://docs.test/uploads/invoice-INV202506001.html"
        );
        let written = std::fs::read_to_string(&second.location).unwrap();
        assert_eq!(written, "<p>v2</p>");

        let entries = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exports_of_one_document_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileSystemExporter::new(dir.path(), "http://docs.test/uploads");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let exporter = exporter.clone();
                tokio::spawn(async move { exporter.export(&document(&format!("<p>v{}</p>", i))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["invoice-INV202506001.html".to_string()]);
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let exporter = FileSystemExporter::new(&blocker, "http://docs.test");

        let err = exporter.export(&document("<p/>")).await.unwrap_err();
        assert!(matches!(err, ServiceError::ExportError(_)));
    }
}
