//! Cuecast domain model and pure sync logic.
//!
//! Holds the template/cue data model, the dirty-state evaluator, the
//! timeline serializer, package entry naming, typed request envelopes,
//! and the local collaborators (thumbnailing, on-disk template store)
//! that the sync orchestrator consumes.

pub mod cloud;
pub mod delta;
pub mod envelope;
pub mod error;
pub mod hashing;
pub mod naming;
pub mod store;
pub mod template;
pub mod thumbnail;
pub mod timeline;
pub mod types;
pub mod version;
