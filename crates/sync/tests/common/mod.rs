//! Shared fixtures for sync integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use cuecast_core::cloud::{CloudTemplate, PublishResponse, PublishStatus};
use cuecast_core::envelope::MetadataEnvelope;
use cuecast_core::error::CoreError;
use cuecast_core::template::Template;
use cuecast_core::thumbnail::Thumbnailer;
use cuecast_core::types::{CueKey, Timestamp};
use cuecast_core::version::TemplateVersion;
use cuecast_package::ArchiveBuilder;
use cuecast_sync::TemplateSync;
use cuecast_transport::{TemplateTransport, TransferProgress, TransportError, UploadRequest};
use tokio_util::sync::CancellationToken;

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// A solid-colour JPEG of the given size.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

/// Cover, an imaged cue at 0s saying "Hello", a plain cue at 5s, 10s long.
pub fn two_cue_template() -> Template {
    let mut t = Template::new("Warmup", 10.0, TemplateVersion::new(1, 0), t0());
    t.set_cover(Some(jpeg(200, 200)), t0());
    t.add_cue(CueKey::from_millis(0), "Hello", Some(jpeg(16, 16)), t0())
        .unwrap();
    t.add_cue(CueKey::from_millis(5000), "World", None, t0())
        .unwrap();
    t
}

/// One upload as seen by [`FakeTransport`].
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub metadata: MetadataEnvelope,
    pub archive: Arc<Vec<u8>>,
    pub force_override: bool,
}

type Responder = dyn Fn(&UploadRequest) -> Result<PublishResponse, TransportError> + Send + Sync;

/// In-memory backend that records uploads and answers from a closure.
pub struct FakeTransport {
    responder: Box<Responder>,
    sections: HashMap<String, Vec<CloudTemplate>>,
    hang: bool,
    uploads: Mutex<Vec<RecordedUpload>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    pub fn with_responder(
        responder: impl Fn(&UploadRequest) -> Result<PublishResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            sections: HashMap::new(),
            hang: false,
            uploads: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Accepts every upload, answering with `uid` (or the update target).
    pub fn accepting(uid: &str) -> Self {
        let uid = uid.to_string();
        Self::with_responder(move |request| {
            let uid = match &request.metadata {
                MetadataEnvelope::Create(_) => uid.clone(),
                MetadataEnvelope::Update(env) => env.cloud_uid.clone(),
            };
            Ok(response(&uid, PublishStatus::Processing))
        })
    }

    /// Records the upload, then waits for cancellation.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::accepting("never")
        }
    }

    pub fn with_section(mut self, section_uid: &str, templates: Vec<CloudTemplate>) -> Self {
        self.sections.insert(section_uid.to_string(), templates);
        self
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    /// Every transport call, including ones refused for cancellation.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn response(uid: &str, status: PublishStatus) -> PublishResponse {
    PublishResponse {
        uid: uid.to_string(),
        status,
        error_message: None,
    }
}

#[async_trait]
impl TemplateTransport for FakeTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<PublishResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let size = request.archive.len() as u64;
        if let Some(tx) = &request.progress {
            tx.send_replace(TransferProgress {
                sent: size,
                total: Some(size),
            });
        }
        self.uploads.lock().unwrap().push(RecordedUpload {
            metadata: request.metadata.clone(),
            archive: Arc::clone(&request.archive),
            force_override: request.force_override,
        });

        if self.hang {
            cancel.cancelled().await;
            return Err(TransportError::Cancelled);
        }
        (self.responder)(&request)
    }

    async fn list_section_templates(
        &self,
        section_uid: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<CloudTemplate>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sections
            .get(section_uid)
            .cloned()
            .ok_or_else(|| TransportError::Server {
                status: 404,
                message: format!("Section {section_uid} not found"),
            })
    }

    async fn template_status(
        &self,
        cloud_uid: &str,
        _cancel: &CancellationToken,
    ) -> Result<PublishResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(response(cloud_uid, PublishStatus::Completed))
    }
}

/// Thumbnailer returning fixed bytes and counting calls.
#[derive(Default)]
pub struct FakeThumbnailer {
    calls: AtomicUsize,
}

impl FakeThumbnailer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Thumbnailer for FakeThumbnailer {
    async fn thumbnail(&self, _cover: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"thumbnail".to_vec())
    }
}

/// Orchestrator over the fakes, publishing as `user-1`.
pub fn sync_with(
    transport: &Arc<FakeTransport>,
    thumbnailer: &Arc<FakeThumbnailer>,
    scratch: &Path,
) -> TemplateSync {
    TemplateSync::new(
        Arc::clone(transport) as Arc<dyn TemplateTransport>,
        Arc::clone(thumbnailer) as Arc<dyn Thumbnailer>,
        ArchiveBuilder::new(scratch),
    )
    .with_user_uid(Some("user-1".to_string()))
}

pub fn cloud_template(uid: &str, section: &str, created_at: Timestamp) -> CloudTemplate {
    CloudTemplate {
        uid: uid.to_string(),
        title: format!("Template {uid}"),
        version: "1.0".to_string(),
        language_section_uid: section.to_string(),
        duration: 10.0,
        tags: Vec::new(),
        created_at,
        package_url: None,
    }
}
