//! Authenticated HTTP transport for the template backend.
//!
//! [`TemplateTransport`] is the seam the sync orchestrator talks to;
//! [`http::HttpTransport`] implements it over [`reqwest`] with multipart
//! uploads, a progress side channel and cooperative cancellation.

pub mod credentials;
pub mod error;
pub mod http;
pub mod progress;
pub mod request;

use async_trait::async_trait;
use cuecast_core::cloud::{CloudTemplate, PublishResponse};
use tokio_util::sync::CancellationToken;

pub use credentials::{Anonymous, CredentialsProvider, StaticToken};
pub use error::TransportError;
pub use http::HttpTransport;
pub use progress::TransferProgress;
pub use request::UploadRequest;

/// Operations the sync orchestrator needs from the backend.
#[async_trait]
pub trait TemplateTransport: Send + Sync {
    /// Upload a package with its metadata envelope.
    async fn upload(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<PublishResponse, TransportError>;

    /// List the templates published to one language section.
    async fn list_section_templates(
        &self,
        section_uid: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CloudTemplate>, TransportError>;

    /// Fetch the processing state of a published template.
    async fn template_status(
        &self,
        cloud_uid: &str,
        cancel: &CancellationToken,
    ) -> Result<PublishResponse, TransportError>;
}
