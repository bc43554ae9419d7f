//! Performance template data model.
//!
//! A [`Template`] is a cover image, a fixed duration and an ordered set of
//! [`Cue`]s. Every mutator takes the instant of the mutation and bumps
//! exactly the timestamps of the surface it touches; the dirty-state
//! evaluator in [`crate::delta`] relies on those timestamps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delta::{SyncDelta, SyncState};
use crate::error::CoreError;
use crate::types::{CueKey, Timestamp};
use crate::version::TemplateVersion;

/// A single timestamped point in a template timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    #[serde(rename = "time_ms")]
    pub key: CueKey,
    pub script: String,
    /// Image bytes. Persisted next to the manifest, not inside it.
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    pub created_at: Timestamp,
    /// Last script mutation.
    pub updated_at: Timestamp,
    /// Last image mutation, independent of the script.
    pub image_updated_at: Option<Timestamp>,
    /// Name the server knows this cue's image by, recorded at the last
    /// successful sync.
    pub image_name: Option<String>,
}

impl Cue {
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// A user-authored timed performance script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub duration_secs: f64,
    pub version: TemplateVersion,
    #[serde(default)]
    pub cloud_uid: Option<String>,
    #[serde(default)]
    pub cloud_version: Option<TemplateVersion>,
    #[serde(default)]
    pub last_synced_at: Option<Timestamp>,
    pub created_at: Timestamp,
    /// Last metadata or cue-set mutation.
    pub updated_at: Timestamp,
    #[serde(default)]
    pub cover_updated_at: Option<Timestamp>,
    /// Cover JPEG bytes. Persisted next to the manifest, not inside it.
    #[serde(skip)]
    pub cover: Option<Vec<u8>>,
    /// Sorted by key, keys unique.
    #[serde(default)]
    cues: Vec<Cue>,
}

impl Template {
    pub fn new(
        title: impl Into<String>,
        duration_secs: f64,
        version: TemplateVersion,
        now: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            tags: Vec::new(),
            duration_secs,
            version,
            cloud_uid: None,
            cloud_version: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
            cover_updated_at: None,
            cover: None,
            cues: Vec::new(),
        }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn cue(&self, key: CueKey) -> Option<&Cue> {
        self.position(key).ok().map(|idx| &self.cues[idx])
    }

    pub fn cue_mut(&mut self, key: CueKey) -> Option<&mut Cue> {
        self.position(key).ok().map(|idx| &mut self.cues[idx])
    }

    fn position(&self, key: CueKey) -> Result<usize, usize> {
        self.cues.binary_search_by_key(&key, |c| c.key)
    }

    // ---- metadata ----

    pub fn set_title(&mut self, title: impl Into<String>, now: Timestamp) {
        self.title = title.into();
        self.updated_at = now;
    }

    pub fn set_tags(&mut self, tags: Vec<String>, now: Timestamp) {
        self.tags = tags;
        self.updated_at = now;
    }

    pub fn set_duration(&mut self, duration_secs: f64, now: Timestamp) {
        self.duration_secs = duration_secs;
        self.updated_at = now;
    }

    /// Change the version. Does not count as a content mutation on its own.
    pub fn set_version(&mut self, version: TemplateVersion) {
        self.version = version;
    }

    pub fn set_cover(&mut self, cover: Option<Vec<u8>>, now: Timestamp) {
        self.cover = cover;
        self.cover_updated_at = Some(now);
    }

    // ---- cues ----

    /// Insert a new cue. Fails if a cue already exists at `key`.
    pub fn add_cue(
        &mut self,
        key: CueKey,
        script: impl Into<String>,
        image: Option<Vec<u8>>,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let idx = match self.position(key) {
            Ok(_) => {
                return Err(CoreError::Validation(format!(
                    "A cue already exists at {key}"
                )))
            }
            Err(idx) => idx,
        };
        let image_updated_at = image.as_ref().map(|_| now);
        self.cues.insert(
            idx,
            Cue {
                key,
                script: script.into(),
                image,
                created_at: now,
                updated_at: now,
                image_updated_at,
                image_name: None,
            },
        );
        Ok(())
    }

    pub fn set_cue_script(
        &mut self,
        key: CueKey,
        script: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let cue = self.cue_mut(key).ok_or(CoreError::CueNotFound(key))?;
        cue.script = script.into();
        cue.updated_at = now;
        Ok(())
    }

    /// Replace or clear a cue's image.
    ///
    /// Either way the server-known name is dropped: new bytes are never
    /// uploaded under a name a cache may already hold.
    pub fn set_cue_image(
        &mut self,
        key: CueKey,
        image: Option<Vec<u8>>,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let cue = self.cue_mut(key).ok_or(CoreError::CueNotFound(key))?;
        cue.image_name = None;
        cue.image = image;
        cue.image_updated_at = Some(now);
        Ok(())
    }

    /// Remove a cue. Counts as a structural (metadata) mutation.
    pub fn remove_cue(&mut self, key: CueKey, now: Timestamp) -> Result<Cue, CoreError> {
        let idx = self.position(key).map_err(|_| CoreError::CueNotFound(key))?;
        self.updated_at = now;
        Ok(self.cues.remove(idx))
    }

    // ---- derived views ----

    /// Latest cue time in seconds, or `0.0` for an empty timeline.
    pub fn max_cue_secs(&self) -> f64 {
        self.cues.last().map_or(0.0, |c| c.key.as_secs_f64())
    }

    /// Image names already known to the server, for every cue that still
    /// has an image.
    pub fn image_names(&self) -> BTreeMap<CueKey, String> {
        self.cues
            .iter()
            .filter(|c| c.has_image())
            .filter_map(|c| c.image_name.clone().map(|name| (c.key, name)))
            .collect()
    }

    /// Check the template invariants.
    ///
    /// - title is non-empty
    /// - duration is finite and non-negative
    /// - cue keys are strictly ascending (unique)
    /// - duration covers the last cue
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation("Title must not be empty".into()));
        }
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(CoreError::Validation(format!(
                "Duration must be a non-negative number, got {}",
                self.duration_secs
            )));
        }
        if let Some(pair) = self.cues.windows(2).find(|w| w[0].key >= w[1].key) {
            return Err(CoreError::Validation(format!(
                "Cue times must be unique and ascending ({} then {})",
                pair[0].key, pair[1].key
            )));
        }
        if self.duration_secs < self.max_cue_secs() {
            return Err(CoreError::Validation(format!(
                "Duration {}s is shorter than the last cue at {}s",
                self.duration_secs,
                self.max_cue_secs()
            )));
        }
        Ok(())
    }

    /// Derive local/synced/modified status from timestamps.
    pub fn sync_state(&self) -> SyncState {
        if self.cloud_uid.is_none() {
            return SyncState::Local;
        }
        match SyncDelta::evaluate(self) {
            Ok(delta) if delta.is_empty() => SyncState::Synced,
            Ok(_) => SyncState::Modified,
            // Published but no anchor recorded: treat everything as pending.
            Err(_) => SyncState::Modified,
        }
    }

    /// Record a successful publish or update.
    ///
    /// `synced_at` should be the instant the attempt snapshotted the
    /// template, so edits made while the upload was in flight stay dirty.
    /// `image_names` is the complete cue-to-name mapping the upload used.
    pub fn mark_synced(
        &mut self,
        cloud_uid: impl Into<String>,
        image_names: &BTreeMap<CueKey, String>,
        synced_at: Timestamp,
    ) {
        self.cloud_uid = Some(cloud_uid.into());
        self.cloud_version = Some(self.version.clone());
        self.last_synced_at = Some(synced_at);
        for cue in &mut self.cues {
            cue.image_name = if cue.has_image() {
                image_names.get(&cue.key).cloned()
            } else {
                None
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> Template {
        let mut t = Template::new("Warmup", 10.0, TemplateVersion::default(), t0());
        t.add_cue(CueKey::from_millis(5000), "Breathe", None, t0())
            .unwrap();
        t.add_cue(CueKey::from_millis(0), "Hello", Some(vec![1, 2, 3]), t0())
            .unwrap();
        t
    }

    #[test]
    fn cues_stay_sorted() {
        let t = sample();
        let keys: Vec<u64> = t.cues().iter().map(|c| c.key.as_millis()).collect();
        assert_eq!(keys, vec![0, 5000]);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn duplicate_cue_rejected() {
        let mut t = sample();
        assert_matches!(
            t.add_cue(CueKey::from_millis(0), "again", None, t0()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn duration_must_cover_last_cue() {
        let mut t = sample();
        t.set_duration(4.0, t0());
        assert_matches!(t.validate(), Err(CoreError::Validation(msg)) if msg.contains("shorter"));
    }

    #[test]
    fn empty_title_rejected() {
        let mut t = sample();
        t.set_title("  ", t0());
        assert_matches!(t.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn script_edit_bumps_only_cue_timestamp() {
        let mut t = sample();
        let later = t0() + Duration::seconds(30);
        t.set_cue_script(CueKey::from_millis(5000), "Exhale", later)
            .unwrap();
        let cue = t.cue(CueKey::from_millis(5000)).unwrap();
        assert_eq!(cue.updated_at, later);
        assert_eq!(cue.image_updated_at, None);
        assert_eq!(t.updated_at, t0());
    }

    #[test]
    fn image_edit_drops_known_name() {
        let mut t = sample();
        let key = CueKey::from_millis(0);
        t.cue_mut(key).unwrap().image_name = Some("1-0.jpg".into());

        let later = t0() + Duration::seconds(5);
        t.set_cue_image(key, Some(vec![9]), later).unwrap();
        let cue = t.cue(key).unwrap();
        assert_eq!(cue.image_name, None);
        assert_eq!(cue.image_updated_at, Some(later));
        assert_eq!(cue.updated_at, t0());
        assert!(t.image_names().is_empty());

        t.cue_mut(key).unwrap().image_name = Some("2-0.jpg".into());
        t.set_cue_image(key, None, later).unwrap();
        assert_eq!(t.cue(key).unwrap().image_name, None);
    }

    #[test]
    fn remove_cue_bumps_template_timestamp() {
        let mut t = sample();
        let later = t0() + Duration::minutes(1);
        let removed = t.remove_cue(CueKey::from_millis(5000), later).unwrap();
        assert_eq!(removed.script, "Breathe");
        assert_eq!(t.updated_at, later);
        assert_matches!(
            t.remove_cue(CueKey::from_millis(5000), later),
            Err(CoreError::CueNotFound(_))
        );
    }

    #[test]
    fn mark_synced_records_names_and_anchor() {
        let mut t = sample();
        let names = BTreeMap::from([(CueKey::from_millis(0), "abc-0.jpg".to_string())]);
        let at = t0() + Duration::seconds(1);
        t.mark_synced("cloud-1", &names, at);

        assert_eq!(t.cloud_uid.as_deref(), Some("cloud-1"));
        assert_eq!(t.cloud_version, Some(TemplateVersion::default()));
        assert_eq!(t.last_synced_at, Some(at));
        assert_eq!(t.image_names(), names);
        assert_eq!(t.cue(CueKey::from_millis(5000)).unwrap().image_name, None);
    }

    #[test]
    fn sync_state_transitions() {
        let mut t = sample();
        assert_eq!(t.sync_state(), SyncState::Local);

        t.mark_synced("cloud-1", &BTreeMap::new(), t0() + Duration::seconds(1));
        assert_eq!(t.sync_state(), SyncState::Synced);

        t.set_title("Warmup II", t0() + Duration::seconds(2));
        assert_eq!(t.sync_state(), SyncState::Modified);
    }

    #[test]
    fn manifest_serialization_skips_blobs() {
        let t = sample();
        let json = serde_json::to_value(&t).unwrap();
        assert!(json.get("cover").is_none());
        assert_eq!(json["cues"][0]["time_ms"], 0);
        assert!(json["cues"][0].get("image").is_none());
        assert_eq!(json["version"], "1.0");
    }
}
