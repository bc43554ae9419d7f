//! Dirty-state evaluation.
//!
//! [`SyncDelta::evaluate`] is the single place that decides which parts of
//! a published template changed since its last successful sync. Nothing
//! else re-derives dirtiness; the stored template carries timestamps, not
//! status flags.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::template::Template;
use crate::types::CueKey;

/// Derived sync status of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Never published.
    Local,
    /// Published and unchanged since.
    Synced,
    /// Published, with local changes pending.
    Modified,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Synced => "synced",
            Self::Modified => "modified",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Surfaces that changed since `last_synced_at`. Recomputed per attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDelta {
    pub metadata_changed: bool,
    pub cover_changed: bool,
    /// Any cue script changed.
    pub timeline_structure_changed: bool,
    pub script_changed: BTreeSet<CueKey>,
    pub image_changed: BTreeSet<CueKey>,
}

impl SyncDelta {
    /// Compare every mutation timestamp against the template's sync anchor.
    ///
    /// Only meaningful for published templates; a first publish always
    /// sends everything.
    pub fn evaluate(template: &Template) -> Result<Self, CoreError> {
        let anchor = template.last_synced_at.ok_or(CoreError::NeverSynced)?;

        let mut delta = Self {
            metadata_changed: template.updated_at > anchor,
            cover_changed: template.cover_updated_at.is_some_and(|at| at > anchor),
            ..Self::default()
        };

        for cue in template.cues() {
            if cue.updated_at > anchor {
                delta.script_changed.insert(cue.key);
            }
            if cue.image_updated_at.is_some_and(|at| at > anchor) {
                delta.image_changed.insert(cue.key);
            }
        }
        delta.timeline_structure_changed = !delta.script_changed.is_empty();

        Ok(delta)
    }

    /// True when nothing needs to be transmitted.
    pub fn is_empty(&self) -> bool {
        !self.metadata_changed
            && !self.cover_changed
            && !self.timeline_structure_changed
            && self.image_changed.is_empty()
    }

    /// Whether the timeline document has to be resent.
    ///
    /// Besides script edits, the document holds the duration and the cue
    /// set (metadata), and the per-cue image names. Any image change alters
    /// the name list, since added, replaced and removed images all lose the
    /// name the server knew.
    pub fn requires_timeline(&self, template: &Template) -> bool {
        if self.timeline_structure_changed || self.metadata_changed {
            return true;
        }
        self.image_changed
            .iter()
            .any(|key| template.cue(*key).is_some_and(|cue| cue.image_name.is_none()))
    }

    /// Cues whose image bytes have to be sent.
    pub fn images_to_send(&self, template: &Template) -> BTreeSet<CueKey> {
        self.image_changed
            .iter()
            .copied()
            .filter(|key| template.cue(*key).is_some_and(|c| c.has_image()))
            .collect()
    }
}
