//! Per-call sync context.

use cuecast_transport::TransferProgress;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Cancellation and progress plumbing for one sync call.
///
/// The token is checked before every phase and raced against the upload.
/// Progress, if wanted, reports upload bytes only.
#[derive(Debug, Default)]
pub struct SyncContext {
    pub cancel: CancellationToken,
    pub progress: Option<watch::Sender<TransferProgress>>,
}

impl SyncContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: watch::Sender<TransferProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
