//! Error taxonomy for mod resolution and installation.
//!
//! Functions return `anyhow::Result`; callers that need to react to a specific
//! failure use `err.downcast_ref::<Error>()`.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A requirement string could not be parsed
    InvalidRequirement(String),
    /// A mod name could not be found locally or in the catalog
    ModNotFound(String),
    /// A required dependency has no matching release
    UnmetDependency { requirement: String, reason: String },
    /// The catalog rejected the credentials
    Auth(String),
    /// The account does not own the game
    Ownership(String),
    /// Downloaded size differs from the expected size
    CorruptDownload {
        file_name: String,
        expected: u64,
        actual: u64,
    },
    /// An archive entry would escape the extraction directory
    UnsafeArchiveEntry { archive: PathBuf, entry: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidRequirement(text) => write!(f, "Invalid requirement: {}", text),
            Error::ModNotFound(name) => write!(f, "Mod not found: {}", name),
            Error::UnmetDependency {
                requirement,
                reason,
            } => write!(f, "Dependency can not be met: {} ({})", requirement, reason),
            Error::Auth(msg) => write!(f, "Authentication error: {}", msg),
            Error::Ownership(msg) => write!(
                f,
                "Ownership error: {}. Your Factorio account doesn't own the game.",
                msg
            ),
            Error::CorruptDownload {
                file_name,
                expected,
                actual,
            } => write!(
                f,
                "Corrupt download for {}: expected {} bytes, received {}",
                file_name, expected, actual
            ),
            Error::UnsafeArchiveEntry { archive, entry } => write!(
                f,
                "Unsafe entry {:?} in archive {}",
                entry,
                archive.display()
            ),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Returns the taxonomy error carried by an `anyhow::Error`, if any.
    pub fn find(err: &anyhow::Error) -> Option<&Error> {
        err.chain().find_map(|e| e.downcast_ref::<Error>())
    }

    /// Whether the failure came from the credential exchange.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Ownership(_))
    }
}
