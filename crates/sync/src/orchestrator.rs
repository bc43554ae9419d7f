//! Template sync orchestrator.
//!
//! Drives one publish or update attempt through its phases:
//!
//! 1. Evaluating: check preconditions and, for updates, compute the delta.
//! 2. Serializing: thumbnail the cover and serialize the timeline.
//! 3. Packaging: build the archive on the blocking pool.
//! 4. Uploading: send the package with its metadata envelope.
//!
//! The orchestrator reads the template and never writes it back; callers
//! apply a [`Published`] result themselves.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use cuecast_core::cloud::{PublishResponse, PublishStatus};
use cuecast_core::delta::SyncDelta;
use cuecast_core::envelope::{CreateEnvelope, MetadataEnvelope, UpdateEnvelope};
use cuecast_core::template::Template;
use cuecast_core::thumbnail::{ImageThumbnailer, Thumbnailer};
use cuecast_core::timeline::{serialize_timeline, ImagePayload};
use cuecast_core::types::{CueKey, Timestamp};
use cuecast_core::version::TemplateVersion;
use cuecast_package::{ArchiveBuilder, Package, PackageMode, PackageParts};
use cuecast_transport::{TemplateTransport, TransportError, UploadRequest};
use uuid::Uuid;

use crate::config::{SyncConfig, DEFAULT_LIST_CONCURRENCY};
use crate::context::SyncContext;
use crate::error::SyncError;
use crate::outcome::{PendingOverride, PublishOutcome, Published};

/// Stages of a sync attempt, logged as the attempt advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Evaluating,
    Serializing,
    Packaging,
    Uploading,
    Succeeded,
    Conflicted,
    Failed,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluating => "evaluating",
            Self::Serializing => "serializing",
            Self::Packaging => "packaging",
            Self::Uploading => "uploading",
            Self::Succeeded => "succeeded",
            Self::Conflicted => "conflicted",
            Self::Failed => "failed",
        }
    }
}

/// Publishes and updates templates against one backend.
///
/// Holds configuration and shared handles only, so one instance can serve
/// concurrent calls for different templates.
pub struct TemplateSync {
    pub(crate) transport: Arc<dyn TemplateTransport>,
    thumbnailer: Arc<dyn Thumbnailer>,
    builder: ArchiveBuilder,
    user_uid: Option<String>,
    pub(crate) list_concurrency: usize,
}

impl TemplateSync {
    pub fn new(
        transport: Arc<dyn TemplateTransport>,
        thumbnailer: Arc<dyn Thumbnailer>,
        builder: ArchiveBuilder,
    ) -> Self {
        Self {
            transport,
            thumbnailer,
            builder,
            user_uid: None,
            list_concurrency: DEFAULT_LIST_CONCURRENCY,
        }
    }

    /// Wire up the HTTP transport and image thumbnailer from configuration.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let transport = config.transport()?;
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(ImageThumbnailer::default()),
            ArchiveBuilder::new(&config.scratch_dir),
        )
        .with_user_uid(config.user_uid.clone())
        .with_list_concurrency(config.list_concurrency))
    }

    pub fn with_user_uid(mut self, user_uid: Option<String>) -> Self {
        self.user_uid = user_uid;
        self
    }

    pub fn with_list_concurrency(mut self, list_concurrency: usize) -> Self {
        self.list_concurrency = list_concurrency.max(1);
        self
    }

    /// First publish of a template into a language section.
    ///
    /// Sends a full package: cover, thumbnail, timeline and every cue image.
    pub async fn publish(
        &self,
        template: &Template,
        language_section_uid: &str,
        ctx: &SyncContext,
    ) -> Result<PublishOutcome, SyncError> {
        let attempt = Attempt::start(template, "publish", ctx);
        let result = self.run_publish(&attempt, template, language_section_uid).await;
        attempt.finish(&result);
        result
    }

    /// Incremental update of an already-published template.
    ///
    /// Sends only the surfaces changed since the last sync, or returns
    /// [`PublishOutcome::NoChanges`] without building anything.
    pub async fn update(
        &self,
        template: &Template,
        ctx: &SyncContext,
    ) -> Result<PublishOutcome, SyncError> {
        let attempt = Attempt::start(template, "update", ctx);
        let result = self.run_update(&attempt, template).await;
        attempt.finish(&result);
        result
    }

    /// Resend a package the server refused with 409, asking it to replace
    /// what it holds. The archive bytes are reused as-is.
    pub async fn force_override(
        &self,
        pending: PendingOverride,
        ctx: &SyncContext,
    ) -> Result<Published, SyncError> {
        let attempt = Attempt {
            template_id: pending.template_id,
            version: envelope_version(&pending.envelope).clone(),
            snapshot_at: pending.snapshot_at,
            kind: "override",
            ctx,
        };

        let result = async {
            attempt.enter(SyncPhase::Uploading)?;
            let response = self
                .upload(&pending.envelope, &pending.package, true, ctx)
                .await?;
            attempt.accept(response, &pending.package, pending.image_names.clone(), true)
        }
        .await;

        match &result {
            Ok(published) => attempt.succeeded("SUCCESS", Some(published.cloud_uid())),
            Err(e) => attempt.failed(e),
        }
        result
    }

    /// Processing state of a published template.
    pub async fn template_status(
        &self,
        cloud_uid: &str,
        ctx: &SyncContext,
    ) -> Result<PublishResponse, SyncError> {
        Ok(self.transport.template_status(cloud_uid, &ctx.cancel).await?)
    }

    // ---- attempts ----

    async fn run_publish(
        &self,
        attempt: &Attempt<'_>,
        template: &Template,
        language_section_uid: &str,
    ) -> Result<PublishOutcome, SyncError> {
        attempt.enter(SyncPhase::Evaluating)?;
        let cover = template.cover.as_deref().ok_or_else(|| {
            SyncError::InvalidTemplate("A cover image is required to publish".into())
        })?;
        template.validate()?;
        let user_uid = self.user_uid.as_deref().ok_or(SyncError::MissingUser)?;
        let envelope = MetadataEnvelope::Create(CreateEnvelope::from_template(
            template,
            user_uid,
            language_section_uid,
        )?);
        if let Some(cloud_uid) = &template.cloud_uid {
            tracing::warn!(
                template_id = %template.id,
                cloud_uid = %cloud_uid,
                "Template is already published; publishing a new copy",
            );
        }

        attempt.enter(SyncPhase::Serializing)?;
        let thumbnail = self.thumbnailer.thumbnail(cover).await?;
        let timeline = serialize_timeline(
            template.cues(),
            template.duration_secs,
            &template.image_names(),
            ImagePayload::All,
        )?;
        let timeline_json = timeline.to_json()?;
        let parts = PackageParts {
            cover_original: Some(cover.to_vec()),
            cover_thumbnail: Some(thumbnail),
            timeline: Some(timeline_json),
            cue_images: timeline.images,
        };

        attempt.enter(SyncPhase::Packaging)?;
        let package = self.build(&template.version, parts, PackageMode::Full).await?;

        self.send(attempt, envelope, package, timeline.names).await
    }

    async fn run_update(
        &self,
        attempt: &Attempt<'_>,
        template: &Template,
    ) -> Result<PublishOutcome, SyncError> {
        attempt.enter(SyncPhase::Evaluating)?;
        if template.cloud_uid.is_none() {
            return Err(SyncError::InvalidTemplate(
                "Template has not been published yet".into(),
            ));
        }
        if template.last_synced_at.is_none() {
            return Err(SyncError::InvalidTemplate(
                "Template has no recorded sync to compare against".into(),
            ));
        }

        let delta = SyncDelta::evaluate(template)?;
        if delta.is_empty() {
            return Ok(PublishOutcome::NoChanges);
        }
        if delta.cover_changed && template.cover.is_none() {
            return Err(SyncError::InvalidTemplate(
                "A published template must keep a cover image".into(),
            ));
        }
        template.validate()?;
        let envelope = MetadataEnvelope::Update(UpdateEnvelope::from_template(template)?);

        tracing::debug!(
            template_id = %template.id,
            metadata = delta.metadata_changed,
            cover = delta.cover_changed,
            scripts = delta.script_changed.len(),
            images = delta.image_changed.len(),
            "Evaluated changes since last sync",
        );

        attempt.enter(SyncPhase::Serializing)?;
        let mut parts = PackageParts::default();
        if let Some(cover) = template.cover.as_deref().filter(|_| delta.cover_changed) {
            parts.cover_thumbnail = Some(self.thumbnailer.thumbnail(cover).await?);
            parts.cover_original = Some(cover.to_vec());
        }

        let changed_images = delta.images_to_send(template);
        let timeline = serialize_timeline(
            template.cues(),
            template.duration_secs,
            &template.image_names(),
            ImagePayload::Only(&changed_images),
        )?;
        if delta.requires_timeline(template) {
            parts.timeline = Some(timeline.to_json()?);
        }
        parts.cue_images = timeline.images;

        attempt.enter(SyncPhase::Packaging)?;
        let package = self
            .build(&template.version, parts, PackageMode::Incremental)
            .await?;

        self.send(attempt, envelope, package, timeline.names).await
    }

    // ---- shared steps ----

    async fn build(
        &self,
        version: &TemplateVersion,
        parts: PackageParts,
        mode: PackageMode,
    ) -> Result<Package, SyncError> {
        let builder = self.builder.clone();
        let version = version.clone();
        let package = tokio::task::spawn_blocking(move || builder.build(&version, &parts, mode))
            .await
            .map_err(|e| SyncError::Internal(format!("Package build task failed: {e}")))??;
        Ok(package)
    }

    async fn send(
        &self,
        attempt: &Attempt<'_>,
        envelope: MetadataEnvelope,
        package: Package,
        image_names: BTreeMap<CueKey, String>,
    ) -> Result<PublishOutcome, SyncError> {
        attempt.enter(SyncPhase::Uploading)?;
        tracing::debug!(
            template_id = %attempt.template_id,
            mode = package.mode().as_str(),
            entries = package.entries().len(),
            size = package.bytes().len(),
            digest = package.digest(),
            "Sending package",
        );
        match self.upload(&envelope, &package, false, attempt.ctx).await {
            Ok(response) => Ok(PublishOutcome::Published(attempt.accept(
                response,
                &package,
                image_names,
                false,
            )?)),
            Err(TransportError::Conflict(message)) => {
                Ok(PublishOutcome::Conflict(PendingOverride {
                    template_id: attempt.template_id,
                    message,
                    package,
                    envelope,
                    image_names,
                    snapshot_at: attempt.snapshot_at,
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(
        &self,
        envelope: &MetadataEnvelope,
        package: &Package,
        force_override: bool,
        ctx: &SyncContext,
    ) -> Result<PublishResponse, TransportError> {
        let request = UploadRequest::new(envelope.clone(), package.shared_bytes())
            .force_override(force_override)
            .with_progress(ctx.progress.clone());
        self.transport.upload(request, &ctx.cancel).await
    }
}

fn envelope_version(envelope: &MetadataEnvelope) -> &TemplateVersion {
    match envelope {
        MetadataEnvelope::Create(env) => &env.version,
        MetadataEnvelope::Update(env) => &env.version,
    }
}

/// Logging and cancellation state for one attempt.
struct Attempt<'a> {
    template_id: Uuid,
    version: TemplateVersion,
    /// Taken before anything is read, so later edits stay dirty.
    snapshot_at: Timestamp,
    kind: &'static str,
    ctx: &'a SyncContext,
}

impl<'a> Attempt<'a> {
    fn start(template: &Template, kind: &'static str, ctx: &'a SyncContext) -> Self {
        Self {
            template_id: template.id,
            version: template.version.clone(),
            snapshot_at: Utc::now(),
            kind,
            ctx,
        }
    }

    /// Enter a working phase, unless the caller already cancelled.
    fn enter(&self, phase: SyncPhase) -> Result<(), SyncError> {
        if self.ctx.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        tracing::debug!(
            template_id = %self.template_id,
            kind = self.kind,
            phase = phase.as_str(),
            "Sync phase",
        );
        Ok(())
    }

    fn accept(
        &self,
        response: PublishResponse,
        package: &Package,
        image_names: BTreeMap<CueKey, String>,
        forced: bool,
    ) -> Result<Published, SyncError> {
        if response.status == PublishStatus::Failed {
            return Err(SyncError::ProcessingFailed(
                response
                    .error_message
                    .unwrap_or_else(|| "Package processing failed".to_string()),
            ));
        }
        Ok(Published {
            response,
            image_names,
            version: self.version.clone(),
            snapshot_at: self.snapshot_at,
            package_digest: package.digest().to_string(),
            forced,
        })
    }

    fn finish(&self, result: &Result<PublishOutcome, SyncError>) {
        match result {
            Ok(PublishOutcome::Published(published)) => {
                self.succeeded("SUCCESS", Some(published.cloud_uid()))
            }
            Ok(PublishOutcome::NoChanges) => self.succeeded("NO_CHANGES", None),
            Ok(PublishOutcome::Conflict(pending)) => {
                tracing::warn!(
                    template_id = %self.template_id,
                    kind = self.kind,
                    phase = SyncPhase::Conflicted.as_str(),
                    reason = %pending.message(),
                    "Server already holds this template; override needs confirmation",
                );
            }
            Err(e) => self.failed(e),
        }
    }

    fn succeeded(&self, code: &'static str, cloud_uid: Option<&str>) {
        tracing::info!(
            template_id = %self.template_id,
            kind = self.kind,
            version = %self.version,
            phase = SyncPhase::Succeeded.as_str(),
            outcome = code,
            cloud_uid = cloud_uid.unwrap_or_default(),
            "Sync finished",
        );
    }

    fn failed(&self, error: &SyncError) {
        if error.is_cancelled() {
            tracing::info!(
                template_id = %self.template_id,
                kind = self.kind,
                "Sync cancelled",
            );
            return;
        }
        tracing::warn!(
            template_id = %self.template_id,
            kind = self.kind,
            phase = SyncPhase::Failed.as_str(),
            code = error.code(),
            error = %error,
            "Sync failed",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names() {
        let names: Vec<_> = [
            SyncPhase::Evaluating,
            SyncPhase::Serializing,
            SyncPhase::Packaging,
            SyncPhase::Uploading,
            SyncPhase::Succeeded,
            SyncPhase::Conflicted,
            SyncPhase::Failed,
        ]
        .iter()
        .map(SyncPhase::as_str)
        .collect();
        assert_eq!(
            names,
            [
                "evaluating",
                "serializing",
                "packaging",
                "uploading",
                "succeeded",
                "conflicted",
                "failed"
            ]
        );
    }

    #[test]
    fn list_concurrency_never_zero() {
        let sync = TemplateSync::from_config(&SyncConfig::default())
            .unwrap()
            .with_list_concurrency(0);
        assert_eq!(sync.list_concurrency, 1);
    }
}
