//! Timeline document serialization.
//!
//! Converts a template's cues into the canonical timeline document sent to
//! the server, plus the image bytes to package alongside it:
//!
//! ```json
//! {
//!   "duration": 10.0,
//!   "images": ["1767268800000-0.jpg"],
//!   "events": [
//!     {"time": 0.0, "image": "1767268800000-0.jpg", "text": "Hello"},
//!     {"time": 5.0, "text": "World"}
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::naming::cue_image_name;
use crate::template::Cue;
use crate::types::CueKey;

/// The timeline document as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDocument {
    pub duration: f64,
    pub images: Vec<String>,
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Which cue image bytes to collect while serializing.
#[derive(Debug, Clone, Copy)]
pub enum ImagePayload<'a> {
    /// Names only; the server keeps previously uploaded bytes.
    Omit,
    /// Every cue image (full publish).
    All,
    /// Only the listed cues (incremental update).
    Only(&'a BTreeSet<CueKey>),
}

impl ImagePayload<'_> {
    fn includes(&self, key: CueKey) -> bool {
        match self {
            Self::Omit => false,
            Self::All => true,
            Self::Only(keys) => keys.contains(&key),
        }
    }
}

/// Output of [`serialize_timeline`].
#[derive(Debug, Clone)]
pub struct SerializedTimeline {
    pub document: TimelineDocument,
    /// Complete cue-to-name mapping used by `document`.
    pub names: BTreeMap<CueKey, String>,
    /// Image bytes keyed by image name, per the requested payload.
    pub images: BTreeMap<String, Vec<u8>>,
}

impl SerializedTimeline {
    /// Canonical JSON bytes of the document.
    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(&self.document)?)
    }
}

/// Resolve the image name of every imaged cue.
///
/// Cues already known to the server keep their name; others get a name
/// derived from their image mutation time (or creation time).
pub fn assign_image_names(
    cues: &[Cue],
    existing: &BTreeMap<CueKey, String>,
) -> BTreeMap<CueKey, String> {
    cues.iter()
        .filter(|cue| cue.has_image())
        .map(|cue| {
            let name = existing.get(&cue.key).cloned().unwrap_or_else(|| {
                cue_image_name(cue.image_updated_at.unwrap_or(cue.created_at), cue.key)
            });
            (cue.key, name)
        })
        .collect()
}

/// Serialize cues into a timeline document and an image byte map.
///
/// `cues` may arrive in any order; events are always emitted sorted by
/// time. Duplicate cue times and a duration shorter than the last cue are
/// rejected.
pub fn serialize_timeline(
    cues: &[Cue],
    duration_secs: f64,
    existing_names: &BTreeMap<CueKey, String>,
    payload: ImagePayload<'_>,
) -> Result<SerializedTimeline, CoreError> {
    let mut ordered: Vec<&Cue> = cues.iter().collect();
    ordered.sort_by_key(|cue| cue.key);

    if let Some(pair) = ordered.windows(2).find(|w| w[0].key == w[1].key) {
        return Err(CoreError::Validation(format!(
            "Duplicate cue time {}",
            pair[0].key
        )));
    }
    if let Some(last) = ordered.last() {
        if duration_secs < last.key.as_secs_f64() {
            return Err(CoreError::Validation(format!(
                "Duration {duration_secs}s is shorter than the last cue at {}s",
                last.key.as_secs_f64()
            )));
        }
    }

    let names = assign_image_names(cues, existing_names);

    let mut images = Vec::with_capacity(names.len());
    let mut events = Vec::with_capacity(ordered.len());
    let mut image_bytes = BTreeMap::new();

    for cue in ordered {
        let image = names.get(&cue.key).cloned();
        if let Some(name) = &image {
            images.push(name.clone());
            if payload.includes(cue.key) {
                if let Some(bytes) = &cue.image {
                    image_bytes.insert(name.clone(), bytes.clone());
                }
            }
        }
        events.push(TimelineEvent {
            time: cue.key.as_secs_f64(),
            image,
            text: (!cue.script.is_empty()).then(|| cue.script.clone()),
        });
    }

    Ok(SerializedTimeline {
        document: TimelineDocument {
            duration: duration_secs,
            images,
            events,
        },
        names,
        images: image_bytes,
    })
}
