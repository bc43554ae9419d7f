//! Upload request shape.

use std::sync::Arc;

use cuecast_core::envelope::MetadataEnvelope;
use tokio::sync::watch;

use crate::progress::TransferProgress;

/// Multipart part names and package file metadata.
pub const METADATA_PART: &str = "metadata";
pub const PACKAGE_PART: &str = "media_package";
pub const PACKAGE_FILE_NAME: &str = "template.zip";
pub const PACKAGE_MIME: &str = "application/zip";

/// One package upload.
///
/// The endpoint follows from the envelope: a create envelope targets the
/// publish endpoint, an update envelope the update endpoint of its
/// `cloud_uid`.
#[derive(Debug)]
pub struct UploadRequest {
    pub metadata: MetadataEnvelope,
    pub archive: Arc<Vec<u8>>,
    /// Ask the server to replace instead of rejecting with 409.
    pub force_override: bool,
    pub progress: Option<watch::Sender<TransferProgress>>,
}

impl UploadRequest {
    pub fn new(metadata: MetadataEnvelope, archive: Arc<Vec<u8>>) -> Self {
        Self {
            metadata,
            archive,
            force_override: false,
            progress: None,
        }
    }

    pub fn force_override(mut self, force: bool) -> Self {
        self.force_override = force;
        self
    }

    pub fn with_progress(mut self, progress: Option<watch::Sender<TransferProgress>>) -> Self {
        self.progress = progress;
        self
    }

    /// URL path segments below the API base.
    pub fn path_segments(&self) -> Vec<&str> {
        match &self.metadata {
            MetadataEnvelope::Create(_) => vec!["templates"],
            MetadataEnvelope::Update(env) => vec!["templates", env.cloud_uid.as_str(), "update"],
        }
    }
}
