//! Byte-level transfer progress.
//!
//! Progress is a side channel: senders use `send_replace`, so a missing or
//! dropped receiver never affects the transfer result.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;

/// Upload body chunk size.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes moved so far out of the expected total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub sent: u64,
    /// `None` when the peer did not announce a length.
    pub total: Option<u64>,
}

impl TransferProgress {
    /// Completion ratio in `[0, 1]`, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.sent as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Create a progress channel starting at zero.
pub fn channel() -> (watch::Sender<TransferProgress>, watch::Receiver<TransferProgress>) {
    watch::channel(TransferProgress::default())
}

/// Wrap archive bytes in a streaming body that reports progress per chunk.
pub(crate) fn progress_body(
    bytes: Arc<Vec<u8>>,
    progress: Option<watch::Sender<TransferProgress>>,
) -> reqwest::Body {
    let total = bytes.len() as u64;
    let chunks = bytes.len().div_ceil(UPLOAD_CHUNK_SIZE);

    let stream = futures::stream::iter(0..chunks).map(move |i| {
        let start = i * UPLOAD_CHUNK_SIZE;
        let end = (start + UPLOAD_CHUNK_SIZE).min(bytes.len());
        if let Some(tx) = &progress {
            tx.send_replace(TransferProgress {
                sent: end as u64,
                total: Some(total),
            });
        }
        Ok::<_, std::io::Error>(bytes[start..end].to_vec())
    });

    reqwest::Body::wrap_stream(stream)
}
