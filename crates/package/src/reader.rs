//! Read-side access to a package archive.

use std::io::{Cursor, Read};

use cuecast_core::naming::CUE_IMAGE_DIR;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::PackageError;

/// Upper bound on buffer space reserved from an entry's declared size.
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// An opened package held in memory.
#[derive(Debug)]
pub struct PackageReader<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> PackageReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, PackageError> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(PackageError::Invalid)?;
        Ok(Self { archive })
    }

    /// All entry names, sorted.
    pub fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    /// Names of the cue images in the package, without the directory prefix.
    pub fn cue_image_names(&self) -> Vec<String> {
        self.entry_names()
            .into_iter()
            .filter_map(|n| n.strip_prefix(CUE_IMAGE_DIR).map(str::to_string))
            .collect()
    }

    /// Read one entry, or `None` if the package does not contain it.
    pub fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, PackageError> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(PackageError::Invalid(e)),
        };
        let mut bytes = Vec::with_capacity(prealloc_len(file.size()));
        file.read_to_end(&mut bytes).map_err(PackageError::Read)?;
        Ok(Some(bytes))
    }
}

/// The header size is untrusted; it only sizes the initial buffer.
fn prealloc_len(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}
