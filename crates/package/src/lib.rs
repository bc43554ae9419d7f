//! Versioned template package containers.
//!
//! [`builder::ArchiveBuilder`] writes a zip from optional parts in full or
//! incremental mode; [`reader::PackageReader`] opens one back up.

pub mod builder;
pub mod error;
pub mod reader;

pub use builder::{ArchiveBuilder, Package, PackageMode, PackageParts};
pub use error::PackageError;
pub use reader::PackageReader;
