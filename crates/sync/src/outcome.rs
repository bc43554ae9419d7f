//! Results of a sync attempt.

use std::collections::BTreeMap;

use cuecast_core::cloud::PublishResponse;
use cuecast_core::envelope::MetadataEnvelope;
use cuecast_core::template::Template;
use cuecast_core::types::{CueKey, Timestamp};
use cuecast_core::version::TemplateVersion;
use cuecast_package::Package;
use uuid::Uuid;

/// Result of `publish` or `update` that is not an error.
#[derive(Debug)]
#[must_use]
pub enum PublishOutcome {
    /// The server accepted the package.
    Published(Published),
    /// Nothing changed since the last sync; nothing was built or sent.
    NoChanges,
    /// The server refused with 409. Hand back to the user to confirm an
    /// override; never retried automatically.
    Conflict(PendingOverride),
}

impl PublishOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Published(_) => "SUCCESS",
            Self::NoChanges => "NO_CHANGES",
            Self::Conflict(_) => "CONFLICT",
        }
    }
}

/// A package the server accepted, plus what the caller needs to record it.
#[derive(Debug, Clone)]
pub struct Published {
    pub response: PublishResponse,
    /// Complete cue-to-image-name mapping used by this upload.
    pub image_names: BTreeMap<CueKey, String>,
    pub version: TemplateVersion,
    /// When the attempt snapshotted the template.
    pub snapshot_at: Timestamp,
    /// SHA-256 of the uploaded archive.
    pub package_digest: String,
    pub forced: bool,
}

impl Published {
    pub fn cloud_uid(&self) -> &str {
        &self.response.uid
    }

    /// Record this sync on the template it was produced from.
    ///
    /// The anchor is the snapshot time, so edits made while the upload was
    /// in flight stay pending. The cloud version is the one uploaded, even
    /// if the local version moved on since.
    pub fn apply_to(&self, template: &mut Template) {
        template.mark_synced(&self.response.uid, &self.image_names, self.snapshot_at);
        template.cloud_version = Some(self.version.clone());
    }
}

/// Everything needed to resend a rejected package unchanged.
#[derive(Debug, Clone)]
pub struct PendingOverride {
    pub(crate) template_id: Uuid,
    pub(crate) message: String,
    pub(crate) package: Package,
    pub(crate) envelope: MetadataEnvelope,
    pub(crate) image_names: BTreeMap<CueKey, String>,
    pub(crate) snapshot_at: Timestamp,
}

impl PendingOverride {
    pub fn template_id(&self) -> Uuid {
        self.template_id
    }

    /// The server's explanation of the conflict.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn envelope(&self) -> &MetadataEnvelope {
        &self.envelope
    }

    /// Cloud uid the override targets, or `None` for a first publish.
    pub fn target(&self) -> Option<&str> {
        match &self.envelope {
            MetadataEnvelope::Create(_) => None,
            MetadataEnvelope::Update(env) => Some(&env.cloud_uid),
        }
    }
}
