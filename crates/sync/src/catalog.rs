//! Cloud template listing across language sections.

use cuecast_core::cloud::CloudTemplate;
use futures::{StreamExt, TryStreamExt};

use crate::context::SyncContext;
use crate::error::SyncError;
use crate::orchestrator::TemplateSync;

impl TemplateSync {
    /// List the published templates of every section, newest first.
    ///
    /// Sections are fetched concurrently, at most `list_concurrency` at a
    /// time. The first failing section fails the whole listing.
    pub async fn list_cloud_templates(
        &self,
        section_uids: &[String],
        ctx: &SyncContext,
    ) -> Result<Vec<CloudTemplate>, SyncError> {
        if ctx.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let transport = &self.transport;
        let cancel = &ctx.cancel;
        let pages: Vec<Vec<CloudTemplate>> = futures::stream::iter(section_uids)
            .map(|section| async move {
                transport
                    .list_section_templates(section, cancel)
                    .await
                    .map_err(|e| {
                        tracing::warn!(section = %section, error = %e, "Section listing failed");
                        SyncError::from(e)
                    })
            })
            .buffer_unordered(self.list_concurrency)
            .try_collect()
            .await?;

        let mut templates: Vec<CloudTemplate> = pages.into_iter().flatten().collect();
        templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        tracing::debug!(
            sections = section_uids.len(),
            templates = templates.len(),
            "Listed cloud templates",
        );
        Ok(templates)
    }
}
