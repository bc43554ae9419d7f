//! Differential template sync.
//!
//! [`TemplateSync`] turns a local [`Template`](cuecast_core::template::Template)
//! into a full package on first publish and an incremental one on later
//! updates, uploads it through a
//! [`TemplateTransport`](cuecast_transport::TemplateTransport), and reports
//! a [`PublishOutcome`].

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod outcome;

pub use config::{ConfigError, SyncConfig};
pub use context::SyncContext;
pub use error::SyncError;
pub use orchestrator::{SyncPhase, TemplateSync};
pub use outcome::{PendingOverride, PublishOutcome, Published};
