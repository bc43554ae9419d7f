//! REST client for the template backend.
//!
//! Wraps the backend HTTP API (package upload, section listing, status
//! lookup, package download) using [`reqwest`]. Every call races the
//! caller's [`CancellationToken`]; a cancelled call drops the in-flight
//! request and reports [`TransportError::Cancelled`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cuecast_core::cloud::{CloudTemplate, PublishResponse};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Url};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialsProvider;
use crate::error::{error_for_status, TransportError};
use crate::progress::{progress_body, TransferProgress};
use crate::request::{
    UploadRequest, METADATA_PART, PACKAGE_FILE_NAME, PACKAGE_MIME, PACKAGE_PART,
};
use crate::TemplateTransport;

/// Upper bound on buffer space reserved from a declared `Content-Length`.
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// HTTP client for one backend.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialsProvider>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport for `base_url` (e.g. `https://host/api/v1`).
    ///
    /// `timeout` bounds each request end to end; `None` leaves requests
    /// unbounded so only the caller's cancellation token ends them.
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialsProvider>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Self::with_client(client, base_url, credentials)
    }

    /// Create a transport reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            TransportError::InvalidRequest(format!("Invalid base URL '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest(format!(
                "Base URL '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments below the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Download a package, reporting progress as chunks arrive.
    pub async fn download(
        &self,
        url: &str,
        progress: Option<&watch::Sender<TransferProgress>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        let url = Url::parse(url)
            .or_else(|_| self.base_url.join(url))
            .map_err(|e| TransportError::InvalidRequest(format!("Invalid download URL: {e}")))?;

        cancellable(cancel, async {
            let request = self.authorize(self.client.get(url.clone()));
            let mut response = Self::ensure_success(request.send().await?).await?;
            let total = response.content_length();
            let mut bytes = Vec::with_capacity(total.map_or(0, |t| t.min(MAX_PREALLOC) as usize));

            while let Some(chunk) = response.chunk().await? {
                bytes.extend_from_slice(&chunk);
                if let Some(tx) = progress {
                    tx.send_replace(TransferProgress {
                        sent: bytes.len() as u64,
                        total,
                    });
                }
            }

            tracing::info!(url = %url, size = bytes.len(), "Downloaded package");
            Ok::<_, TransportError>(bytes)
        })
        .await
    }

    // ---- private helpers ----

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or the classified error for its
    /// status and body on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(error_for_status(status.as_u16(), &body))
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }

    fn upload_form(request: UploadRequest) -> Result<Form, TransportError> {
        let metadata = request
            .metadata
            .to_json()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let metadata_part = Part::text(metadata)
            .mime_str("application/json")
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let length = request.archive.len() as u64;
        let body = progress_body(request.archive, request.progress);
        let package_part = Part::stream_with_length(body, length)
            .file_name(PACKAGE_FILE_NAME)
            .mime_str(PACKAGE_MIME)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Form::new()
            .part(METADATA_PART, metadata_part)
            .part(PACKAGE_PART, package_part))
    }
}

/// Race `fut` against the cancellation token.
///
/// Biased toward cancellation so an already-cancelled token never lets
/// the request start.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        result = fut => result,
    }
}

#[async_trait]
impl TemplateTransport for HttpTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<PublishResponse, TransportError> {
        let mut url = self.endpoint(&request.path_segments());
        if request.force_override {
            url.query_pairs_mut().append_pair("force", "true");
        }
        let size = request.archive.len();
        let force = request.force_override;
        let form = Self::upload_form(request)?;

        tracing::debug!(url = %url, size, force, "Uploading package");

        let response: PublishResponse = cancellable(cancel, async {
            let response = self
                .authorize(self.client.post(url.clone()))
                .multipart(form)
                .send()
                .await?;
            Self::parse_response(response).await
        })
        .await?;

        tracing::info!(
            uid = %response.uid,
            status = %response.status,
            size,
            force,
            "Package accepted",
        );
        Ok(response)
    }

    async fn list_section_templates(
        &self,
        section_uid: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CloudTemplate>, TransportError> {
        let url = self.endpoint(&["sections", section_uid, "templates"]);
        cancellable(cancel, async {
            let response = self.authorize(self.client.get(url)).send().await?;
            Self::parse_response(response).await
        })
        .await
    }

    async fn template_status(
        &self,
        cloud_uid: &str,
        cancel: &CancellationToken,
    ) -> Result<PublishResponse, TransportError> {
        let url = self.endpoint(&["templates", cloud_uid]);
        cancellable(cancel, async {
            let response = self.authorize(self.client.get(url)).send().await?;
            Self::parse_response(response).await
        })
        .await
    }
}
