//! Error types for container validation, reading and extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for every container operation.
///
/// Each variant names the archive, destination or entry it is about, so a
/// caller can report the failure without extra context.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The location is not a local file (e.g. an `https://` URL).
    #[error("Not a local file: {0}")]
    NotAFile(String),

    /// Archive file not found at the specified path.
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    /// The archive extension is not one of the supported ZIP-based extensions.
    #[error("Unsupported extension: {0}")]
    UnsupportedExtension(PathBuf),

    /// The extraction destination exists but is not a directory.
    #[error("Destination is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The extraction destination exists and overwriting was not requested.
    #[error("Destination already exists: {0}")]
    AlreadyExists(PathBuf),

    /// The file could not be opened or parsed as a ZIP container.
    #[error("Failed to open archive {path}: {reason}")]
    OpenFailed {
        /// Archive path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// The archive violates the EPUB mimetype packaging convention.
    #[error("Invalid EPUB packaging: {0}")]
    InvalidPackaging(PathBuf),

    /// An entry name cannot be represented for lookup.
    #[error("Entry name cannot be encoded: {0:?}")]
    Encoding(String),

    /// No entry matches the requested name.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// An entry could not be opened, described or decompressed.
    #[error("Failed to unzip {entry} from {path}: {reason}")]
    UnzipFailed {
        /// Archive path
        path: PathBuf,
        /// Entry name (index placeholder when the name is unknown)
        entry: String,
        /// Underlying cause
        reason: String,
    },

    /// The decompressed entry does not match its stored CRC-32.
    #[error("Checksum mismatch for {entry} in {path}")]
    ChecksumMismatch {
        /// Archive path
        path: PathBuf,
        /// Entry name
        entry: String,
    },

    /// The entry is encrypted but no password was provided.
    #[error("Password required for {0}")]
    PasswordRequired(String),

    /// The provided password was rejected for the entry.
    #[error("Invalid password for {0}")]
    InvalidPassword(String),

    /// A security violation was detected during extraction.
    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    /// An I/O error occurred while writing extracted data.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Security-related errors during extraction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
    /// Path traversal attempt detected (e.g., "../../../etc/passwd").
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// Absolute path not allowed in archive entries.
    #[error("Absolute path not allowed: {0}")]
    AbsolutePath(String),
}

impl ContainerError {
    /// Classify an error raised by the `zip` crate while opening an entry.
    ///
    /// The crate reports missing and rejected passwords through distinct
    /// variants but also through message text on some code paths, so both
    /// are checked.
    pub(crate) fn from_entry_open(
        err: zip::result::ZipError,
        path: &std::path::Path,
        entry: &str,
        password_given: bool,
    ) -> Self {
        if matches!(err, zip::result::ZipError::InvalidPassword) {
            return Self::InvalidPassword(entry.to_string());
        }

        let err_msg = err.to_string().to_lowercase();
        if err_msg.contains("password")
            || err_msg.contains("encrypted")
            || err_msg.contains("decrypt")
        {
            return if password_given {
                Self::InvalidPassword(entry.to_string())
            } else {
                Self::PasswordRequired(entry.to_string())
            };
        }

        Self::UnzipFailed {
            path: path.to_path_buf(),
            entry: entry.to_string(),
            reason: err.to_string(),
        }
    }
}
