//! Directory-backed template storage.
//!
//! Layout of one template directory:
//!
//! ```text
//! <dir>/
//!   template.json        manifest (metadata, timestamps, cue list)
//!   cover.jpg            cover image, if any
//!   cues/<cue_ms>.jpg    one file per imaged cue
//! ```
//!
//! Blobs live next to the manifest so the manifest stays small and
//! human-readable.

use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::template::Template;

/// Manifest file name inside a template directory.
pub const MANIFEST_FILE: &str = "template.json";

/// Cover file name inside a template directory.
pub const COVER_FILE: &str = "cover.jpg";

/// Subdirectory holding cue images.
pub const CUES_DIR: &str = "cues";

/// Reads and writes a single template directory.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cue_path(&self, cue_ms: u64) -> PathBuf {
        self.root.join(CUES_DIR).join(format!("{cue_ms}.jpg"))
    }

    /// Load the manifest and every blob it references.
    pub async fn load(&self) -> Result<Template, CoreError> {
        let raw = tokio::fs::read(self.root.join(MANIFEST_FILE)).await?;
        let mut template: Template = serde_json::from_slice(&raw)?;

        template.cover = read_optional(&self.root.join(COVER_FILE)).await?;

        let keys: Vec<_> = template.cues().iter().map(|c| c.key).collect();
        for key in keys {
            let image = read_optional(&self.cue_path(key.as_millis())).await?;
            if let Some(cue) = template.cue_mut(key) {
                cue.image = image;
            }
        }

        template.validate()?;
        tracing::debug!(
            template_id = %template.id,
            dir = %self.root.display(),
            cues = template.cues().len(),
            "Loaded template",
        );
        Ok(template)
    }

    /// Write the manifest and blobs, removing blobs that no longer exist.
    pub async fn save(&self, template: &Template) -> Result<(), CoreError> {
        tokio::fs::create_dir_all(self.root.join(CUES_DIR)).await?;

        write_optional(&self.root.join(COVER_FILE), template.cover.as_deref()).await?;

        let mut keep = Vec::with_capacity(template.cues().len());
        for cue in template.cues() {
            let path = self.cue_path(cue.key.as_millis());
            write_optional(&path, cue.image.as_deref()).await?;
            keep.push(path);
        }

        // Drop images of cues that were removed.
        let mut entries = tokio::fs::read_dir(self.root.join(CUES_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !keep.contains(&path) {
                tokio::fs::remove_file(&path).await?;
            }
        }

        let manifest = serde_json::to_vec_pretty(template)?;
        tokio::fs::write(self.root.join(MANIFEST_FILE), manifest).await?;

        tracing::debug!(template_id = %template.id, dir = %self.root.display(), "Saved template");
        Ok(())
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, CoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_optional(path: &Path, bytes: Option<&[u8]>) -> Result<(), CoreError> {
    match bytes {
        Some(bytes) => tokio::fs::write(path, bytes).await?,
        None => match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::types::CueKey;
    use crate::version::TemplateVersion;

    fn template() -> Template {
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap();
        let mut t = Template::new("Store me", 10.0, TemplateVersion::new(2, 3), now);
        t.set_cover(Some(vec![0xFF, 0xD8, 0xAA]), now);
        t.add_cue(CueKey::from_millis(0), "Hello", Some(vec![1, 2]), now)
            .unwrap();
        t.add_cue(CueKey::from_millis(5000), "World", None, now)
            .unwrap();
        t
    }

    #[tokio::test]
    async fn save_then_load_restores_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path());
        let t = template();
        store.save(&t).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, t);
        assert!(dir.path().join(COVER_FILE).exists());
        assert!(dir.path().join(CUES_DIR).join("0.jpg").exists());
        assert!(!dir.path().join(CUES_DIR).join("5000.jpg").exists());
    }

    #[tokio::test]
    async fn removed_cue_image_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path());
        let mut t = template();
        store.save(&t).await.unwrap();

        t.remove_cue(CueKey::from_millis(0), Utc::now()).unwrap();
        store.save(&t).await.unwrap();
        assert!(!dir.path().join(CUES_DIR).join("0.jpg").exists());
    }

    #[tokio::test]
    async fn sync_fields_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path());
        let mut t = template();
        let names = BTreeMap::from([(CueKey::from_millis(0), "n-0.jpg".to_string())]);
        t.mark_synced("cloud-7", &names, Utc::now());
        store.save(&t).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.cloud_uid.as_deref(), Some("cloud-7"));
        assert_eq!(loaded.image_names(), names);
        assert_eq!(loaded.last_synced_at, t.last_synced_at);
    }

    #[tokio::test]
    async fn missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateStore::new(dir.path()).load().await.unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
