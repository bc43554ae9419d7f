//! Package archive builder.
//!
//! Each build streams its entries into its own scratch file, reads the
//! finished archive back into memory and removes the scratch file on every
//! exit path. Builders hold configuration only, so one instance can serve
//! concurrent builds.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cuecast_core::hashing::sha256_hex;
use cuecast_core::naming::{
    cover_original_entry, cover_thumbnail_entry, cue_image_entry, timeline_entry,
};
use cuecast_core::version::TemplateVersion;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackageError;

/// Full packages carry everything; incremental ones only what changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageMode {
    Full,
    Incremental,
}

impl PackageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

/// Raw content to package. Every part is optional in incremental mode.
#[derive(Debug, Clone, Default)]
pub struct PackageParts {
    pub cover_original: Option<Vec<u8>>,
    pub cover_thumbnail: Option<Vec<u8>>,
    /// Serialized timeline document.
    pub timeline: Option<Vec<u8>>,
    /// Cue image bytes keyed by image name.
    pub cue_images: BTreeMap<String, Vec<u8>>,
}

impl PackageParts {
    pub fn is_empty(&self) -> bool {
        self.cover_original.is_none()
            && self.cover_thumbnail.is_none()
            && self.timeline.is_none()
            && self.cue_images.is_empty()
    }
}

/// A built package: archive bytes plus what went into them.
#[derive(Debug, Clone)]
pub struct Package {
    bytes: Arc<Vec<u8>>,
    entries: Vec<String>,
    digest: String,
    mode: PackageMode,
}

impl Package {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the archive bytes; cloning does not copy them.
    pub fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.iter().any(|e| e == entry)
    }

    /// SHA-256 hex digest of the archive bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn mode(&self) -> PackageMode {
        self.mode
    }
}

/// Builds package archives in a scratch directory.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    scratch_dir: PathBuf,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl ArchiveBuilder {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Build a package for `version` from `parts`.
    ///
    /// Full mode requires the cover, its thumbnail and the timeline.
    /// Incremental mode writes whatever is present but refuses to produce
    /// an empty archive.
    pub fn build(
        &self,
        version: &TemplateVersion,
        parts: &PackageParts,
        mode: PackageMode,
    ) -> Result<Package, PackageError> {
        self.build_with(version, parts, mode, |file, plan| write_archive(file, plan))
    }

    /// Build with a custom archive writer; the scratch file handling is
    /// the same as [`ArchiveBuilder::build`].
    fn build_with<F>(
        &self,
        version: &TemplateVersion,
        parts: &PackageParts,
        mode: PackageMode,
        write: F,
    ) -> Result<Package, PackageError>
    where
        F: FnOnce(&File, &[(String, &[u8])]) -> Result<Vec<u8>, PackageError>,
    {
        let plan = plan_entries(version, parts, mode)?;

        let scratch = tempfile::Builder::new()
            .prefix("cuecast-package-")
            .suffix(".zip")
            .tempfile_in(&self.scratch_dir)
            .map_err(PackageError::Create)?;

        let result = write(scratch.as_file(), &plan);

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(
                path = %scratch_path.display(),
                error = %e,
                "Failed to remove package scratch file",
            );
        }

        let bytes = result?;
        let digest = sha256_hex(&bytes);
        let entries: Vec<String> = plan.into_iter().map(|(name, _)| name).collect();

        tracing::debug!(
            version = %version,
            mode = mode.as_str(),
            entries = entries.len(),
            size = bytes.len(),
            digest = %digest,
            "Built package",
        );

        Ok(Package {
            bytes: Arc::new(bytes),
            entries,
            digest,
            mode,
        })
    }
}

/// Resolve entry names and check mode requirements.
fn plan_entries<'a>(
    version: &TemplateVersion,
    parts: &'a PackageParts,
    mode: PackageMode,
) -> Result<Vec<(String, &'a [u8])>, PackageError> {
    if mode == PackageMode::Full {
        if parts.cover_original.is_none() {
            return Err(PackageError::MissingPart("cover original"));
        }
        if parts.cover_thumbnail.is_none() {
            return Err(PackageError::MissingPart("cover thumbnail"));
        }
        if parts.timeline.is_none() {
            return Err(PackageError::MissingPart("timeline"));
        }
    } else if parts.is_empty() {
        return Err(PackageError::Empty);
    }

    let mut plan = Vec::with_capacity(3 + parts.cue_images.len());
    if let Some(bytes) = &parts.cover_original {
        plan.push((cover_original_entry(version), bytes.as_slice()));
    }
    if let Some(bytes) = &parts.cover_thumbnail {
        plan.push((cover_thumbnail_entry(version), bytes.as_slice()));
    }
    if let Some(bytes) = &parts.timeline {
        plan.push((timeline_entry(version), bytes.as_slice()));
    }
    for (name, bytes) in &parts.cue_images {
        plan.push((cue_image_entry(name), bytes.as_slice()));
    }
    Ok(plan)
}

/// Stream every entry into `sink`, then read the finished archive back.
fn write_archive<W>(sink: W, plan: &[(String, &[u8])]) -> Result<Vec<u8>, PackageError>
where
    W: Read + Write + Seek,
{
    let mut zip = ZipWriter::new(sink);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in plan {
        zip.start_file(name.as_str(), options)
            .map_err(|source| PackageError::WriteEntry {
                entry: name.clone(),
                source,
            })?;
        zip.write_all(data).map_err(|e| PackageError::WriteEntry {
            entry: name.clone(),
            source: e.into(),
        })?;
    }

    let mut sink = zip.finish().map_err(PackageError::Finalize)?;
    sink.seek(SeekFrom::Start(0)).map_err(PackageError::Read)?;
    let mut bytes = Vec::new();
    sink.read_to_end(&mut bytes).map_err(PackageError::Read)?;
    Ok(bytes)
}
