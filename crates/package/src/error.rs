/// Errors from building or reading a package.
///
/// Creation, entry-write, finalize and read failures are kept apart so a
/// log line says which stage of the scratch file lifecycle broke.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// A full package was requested without one of its required parts.
    #[error("Missing required package part: {0}")]
    MissingPart(&'static str),

    /// An incremental package was requested with nothing in it.
    #[error("Package would be empty")]
    Empty,

    /// The scratch file could not be created.
    #[error("Failed to create package scratch file: {0}")]
    Create(#[source] std::io::Error),

    /// Writing one entry failed.
    #[error("Failed to write package entry '{entry}': {source}")]
    WriteEntry {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// Writing the central directory failed.
    #[error("Failed to finalize package: {0}")]
    Finalize(#[source] zip::result::ZipError),

    /// Reading the finished archive back failed.
    #[error("Failed to read package: {0}")]
    Read(#[source] std::io::Error),

    /// The bytes are not a readable zip container.
    #[error("Invalid package: {0}")]
    Invalid(#[source] zip::result::ZipError),
}
