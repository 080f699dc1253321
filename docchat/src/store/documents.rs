//! Document list and the selected document.

use tracing::info;

use super::reject;
use crate::api::{ChatApi, DocumentUpload};
use crate::error::{Error, Rejected};
use crate::models::Document;
use crate::notice::Notices;

#[derive(Debug)]
pub struct DocumentStore {
    documents: Vec<Document>,
    selected: Option<Document>,
    is_loading: bool,
    error: Option<String>,
    notices: Notices,
}

impl DocumentStore {
    pub const fn new(notices: Notices) -> Self {
        Self {
            documents: Vec::new(),
            selected: None,
            is_loading: false,
            error: None,
            notices,
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub const fn selected(&self) -> Option<&Document> {
        self.selected.as_ref()
    }

    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn start(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    fn fail(&mut self, err: &Error, fallback: &str) -> Rejected {
        self.is_loading = false;
        reject(&mut self.error, Some(&self.notices), err, fallback)
    }

    /// Upload over REST. The new document is appended and selected.
    pub async fn upload(
        &mut self,
        api: &dyn ChatApi,
        upload: DocumentUpload,
    ) -> Result<Document, Rejected> {
        self.start();
        match api.upload_document(upload).await {
            Ok(reply) => {
                self.is_loading = false;
                self.notices
                    .success(reply.message_or("Document uploaded successfully"));
                info!("Uploaded document {}", reply.data.id);
                self.documents.push(reply.data.clone());
                self.selected = Some(reply.data.clone());
                Ok(reply.data)
            }
            Err(e) => Err(self.fail(&e, "Failed to upload document")),
        }
    }

    pub async fn list_all(&mut self, api: &dyn ChatApi) -> Result<(), Rejected> {
        self.start();
        match api.list_documents().await {
            Ok(reply) => {
                self.is_loading = false;
                self.documents = reply.data;
                Ok(())
            }
            Err(e) => Err(self.fail(&e, "Failed to fetch documents")),
        }
    }

    pub async fn get_one(&mut self, api: &dyn ChatApi, id: &str) -> Result<Document, Rejected> {
        self.start();
        match api.get_document(id).await {
            Ok(reply) => {
                self.is_loading = false;
                self.selected = Some(reply.data.clone());
                Ok(reply.data)
            }
            Err(e) => Err(self.fail(&e, "Failed to fetch document")),
        }
    }

    pub async fn delete(&mut self, api: &dyn ChatApi, id: &str) -> Result<(), Rejected> {
        self.start();
        match api.delete_document(id).await {
            Ok(message) => {
                self.is_loading = false;
                self.notices.success(
                    message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| "Document deleted successfully".to_string()),
                );
                self.documents.retain(|d| d.id != id);
                if self.selected.as_ref().is_some_and(|d| d.id == id) {
                    self.selected = None;
                }
                Ok(())
            }
            Err(e) => Err(self.fail(&e, "Failed to delete document")),
        }
    }

    pub fn reset(&mut self) {
        self.documents.clear();
        self.selected = None;
        self.is_loading = false;
        self.error = None;
    }
}
