//! Document uploads: size check, the REST and channel paths, and tracking of
//! processing progress reported by the backend.

use std::path::Path;

use base64::Engine;
use tracing::{info, warn};

use crate::api::{ChatApi, DocumentUpload};
use crate::channel::{ClientEvent, DocumentEvent, Transport};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::models::Session;
use crate::notice::Notices;
use crate::retry::{retry, RetryPolicy};
use crate::store::{DocumentStore, SessionStore};

/// Largest file accepted for upload (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Where the file came from. Both go through the same checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSource {
    Browse,
    DragDrop,
}

impl UploadSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Browse => "browse",
            Self::DragDrop => "drag-and-drop",
        }
    }
}

/// Which way the file travels to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPath {
    /// Multipart POST, then a session is created for the document.
    Rest,
    /// `upload_document` over the channel; completion arrives as events.
    Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk.
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Validation(format!("{} is not a file", path.display())))?;
        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// A file picker holding at most one selection.
///
/// Picking the file that is already selected is not a change, so it does not
/// start an upload; `reset` clears the selection so the same file can be
/// picked again.
#[derive(Debug, Default)]
pub struct FileInput {
    selected: Option<SelectedFile>,
}

impl FileInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `file`. Returns `false` when it is the file already selected.
    pub fn select(&mut self, file: SelectedFile) -> bool {
        let unchanged = self
            .selected
            .as_ref()
            .is_some_and(|current| current.name == file.name && current.size() == file.size());
        if unchanged {
            return false;
        }
        self.selected = Some(file);
        true
    }

    pub const fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn reset(&mut self) {
        self.selected = None;
    }
}

/// A document the backend is still indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingDocument {
    pub document_id: String,
    pub filename: String,
    /// Percentage, 0 to 100.
    pub progress: u8,
}

/// Result of starting an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Nothing to do (no file, or nobody signed in).
    Ignored,
    /// Refused before any network call.
    Rejected(String),
    /// REST path finished; the session for the new document.
    SessionReady(Session),
    /// Channel path sent; wait for processing events.
    Pending,
    Failed(String),
}

/// What the owner has to do after a processing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEffect {
    None,
    /// Refresh sessions and switch to `session_id`.
    Completed {
        document_id: String,
        session_id: String,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug)]
pub struct UploadCoordinator {
    uploading: bool,
    processing: Vec<ProcessingDocument>,
    retry: RetryPolicy,
    notices: Notices,
}

impl UploadCoordinator {
    pub fn new(notices: Notices) -> Self {
        Self {
            uploading: false,
            processing: Vec::new(),
            retry: RetryPolicy::default(),
            notices,
        }
    }

    /// Use `policy` for channel emits instead of 3 attempts with 1 s steps.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub const fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn processing(&self) -> &[ProcessingDocument] {
        &self.processing
    }

    /// Validate the selection before anything touches the network.
    ///
    /// Oversized files raise an error notice and reset the input, whether or
    /// not anyone is signed in.
    pub fn begin(
        &self,
        input: &mut FileInput,
        source: UploadSource,
        credentials: Option<&Credentials>,
    ) -> std::result::Result<(SelectedFile, String), UploadOutcome> {
        let Some(file) = input.selected().cloned() else {
            return Err(UploadOutcome::Ignored);
        };
        if file.size() > MAX_UPLOAD_BYTES {
            let message = format!(
                "{} is too large ({:.1} MB). Maximum size is 10 MB.",
                file.name,
                file.size() as f64 / (1024.0 * 1024.0)
            );
            warn!("Rejected {} upload: {}", source.as_str(), message);
            self.notices.error(message.clone());
            input.reset();
            return Err(UploadOutcome::Rejected(message));
        }
        let Some(credentials) = credentials else {
            self.notices.error("Please log in first.");
            return Err(UploadOutcome::Ignored);
        };
        info!(
            "Uploading {} ({} bytes) via {}",
            file.name,
            file.size(),
            source.as_str()
        );
        Ok((file, credentials.user_id.clone()))
    }

    /// Multipart upload, then create a session for the document.
    pub async fn upload_via_rest(
        &mut self,
        file: SelectedFile,
        user_id: String,
        api: &dyn ChatApi,
        documents: &mut DocumentStore,
        sessions: &mut SessionStore,
    ) -> UploadOutcome {
        self.uploading = true;
        let upload = DocumentUpload {
            filename: file.name,
            bytes: file.bytes,
            user_id,
        };
        let outcome = match documents.upload(api, upload).await {
            Ok(document) => match sessions.create(api, &document.id).await {
                Ok(session) => UploadOutcome::SessionReady(session),
                Err(rejected) => UploadOutcome::Failed(rejected.0),
            },
            Err(rejected) => UploadOutcome::Failed(rejected.0),
        };
        self.uploading = false;
        outcome
    }

    /// Emit `upload_document` with bounded retry. Stays `uploading` until a
    /// completion or error event arrives.
    pub async fn upload_via_channel(
        &mut self,
        file: SelectedFile,
        user_id: String,
        transport: &dyn Transport,
    ) -> UploadOutcome {
        self.uploading = true;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&file.bytes);
        let result = retry(self.retry, "upload_document", |_| {
            let event = ClientEvent::UploadDocument {
                file: encoded.clone(),
                filename: file.name.clone(),
                owner_id: user_id.clone(),
            };
            async move { transport.emit(event) }
        })
        .await;

        match result {
            Ok(()) => UploadOutcome::Pending,
            Err(e) => {
                warn!("Giving up on upload of {}: {}", file.name, e);
                self.uploading = false;
                self.notices.error("Failed to upload document");
                UploadOutcome::Failed(e.user_message("Failed to upload document"))
            }
        }
    }

    /// Track a processing event from the backend.
    pub fn handle(&mut self, event: DocumentEvent) -> UploadEffect {
        match event {
            DocumentEvent::DocumentProcessingStarted {
                document_id,
                filename,
            } => {
                if !self.processing.iter().any(|d| d.document_id == document_id) {
                    self.processing.push(ProcessingDocument {
                        document_id,
                        filename,
                        progress: 0,
                    });
                }
                UploadEffect::None
            }
            DocumentEvent::DocumentProcessingProgress {
                document_id,
                progress,
            } => {
                let progress = clamp_progress(progress);
                match self
                    .processing
                    .iter_mut()
                    .find(|d| d.document_id == document_id)
                {
                    Some(document) => document.progress = progress,
                    None => self.processing.push(ProcessingDocument {
                        document_id,
                        filename: String::new(),
                        progress,
                    }),
                }
                UploadEffect::None
            }
            DocumentEvent::DocumentProcessingCompleted {
                document_id,
                session_id,
            } => {
                self.processing.retain(|d| d.document_id != document_id);
                self.uploading = false;
                info!("Document {} processed, session {}", document_id, session_id);
                self.notices.success("Document processed successfully");
                UploadEffect::Completed {
                    document_id,
                    session_id,
                }
            }
            DocumentEvent::UploadError { message } => {
                warn!("Upload failed: {}", message);
                self.uploading = false;
                self.notices.error(message.clone());
                UploadEffect::Failed { message }
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_progress(progress: f64) -> u8 {
    if progress.is_nan() {
        return 0;
    }
    progress.clamp(0.0, 100.0).round() as u8
}
