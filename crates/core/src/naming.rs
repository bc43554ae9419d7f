//! Package entry naming convention.
//!
//! Cover and timeline entries carry the template version so a cache can
//! never serve a stale cover or timeline after a version bump. Cue images
//! are not version-qualified: an unchanged image keeps its name across
//! versions and the server reuses the stored bytes.
//!
//! ```text
//! covers_original_v1.1.jpg
//! covers_thumbnails_v1.1.jpg
//! timelines_v1.1.json
//! images/1700000000000-5000.jpg
//! ```

use crate::types::{CueKey, Timestamp};
use crate::version::TemplateVersion;

/// Extension used for every cue image name.
pub const CUE_IMAGE_EXTENSION: &str = "jpg";

/// Directory prefix for cue image entries.
pub const CUE_IMAGE_DIR: &str = "images/";

/// Entry name of the full-size cover image.
pub fn cover_original_entry(version: &TemplateVersion) -> String {
    format!("covers_original_v{version}.jpg")
}

/// Entry name of the cover thumbnail.
pub fn cover_thumbnail_entry(version: &TemplateVersion) -> String {
    format!("covers_thumbnails_v{version}.jpg")
}

/// Entry name of the timeline document.
pub fn timeline_entry(version: &TemplateVersion) -> String {
    format!("timelines_v{version}.json")
}

/// Entry name of a cue image inside the package.
pub fn cue_image_entry(image_name: &str) -> String {
    format!("{CUE_IMAGE_DIR}{image_name}")
}

/// Derive a stable image name for a cue.
///
/// Convention: `{stamp_ms}-{cue_ms}.jpg`, where `stamp_ms` is the cue's
/// image mutation time in milliseconds since the epoch. The cue key
/// suffix keeps two cues stamped in the same millisecond apart.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use cuecast_core::naming::cue_image_name;
/// use cuecast_core::types::CueKey;
///
/// let stamp = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
/// assert_eq!(
///     cue_image_name(stamp, CueKey::from_millis(5000)),
///     "1700000000000-5000.jpg"
/// );
/// ```
pub fn cue_image_name(stamp: Timestamp, key: CueKey) -> String {
    format!(
        "{}-{}.{CUE_IMAGE_EXTENSION}",
        stamp.timestamp_millis(),
        key.as_millis()
    )
}
