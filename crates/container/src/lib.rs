//! # epub-container
//!
//! Reader, validator and extractor for the ZIP container of EPUB files.
//!
//! The crate covers the container layer only: enumerating entries, reading
//! a single entry, unpacking the whole archive, and checking the IDPF
//! packaging rule that the first entry is an uncompressed `mimetype` holding
//! `application/epub+zip`. Plain `.zip` files are accepted as well.
//!
//! Every operation takes the archive as a `Path`. A `file://` URL is resolved
//! to its path, and any other URL fails with [`ContainerError::NotAFile`]
//! before the filesystem is consulted.
//!
//! ## Example
//!
//! ```rust,no_run
//! use epub_container::{extract, list_entries, read_entry, validate};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let book = Path::new("Sample.epub");
//!
//! validate(book)?;
//!
//! for name in list_entries(book, None)? {
//!     println!("{}", name);
//! }
//!
//! let opf = read_entry(book, "OEBPS/content.opf", None)?;
//! println!("{}", String::from_utf8_lossy(&opf));
//!
//! let written = extract(book, Path::new("output"), None, true)?;
//! println!("Extracted {} entries", written.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod extract;
pub mod paths;
pub mod reader;
pub mod safety;
pub mod types;
pub mod validate;

// Re-export main types
pub use error::{ContainerError, SecurityError};
pub use reader::{ArchiveReader, CrcStatus, EntryRecord, EntryStream};
pub use types::{DosTimestamp, ExtractOptions, ParserConfig};

use std::path::Path;
use tracing::info;
use validate::check_archive_path;

/// Check that the archive follows the EPUB mimetype packaging convention.
///
/// # Errors
///
/// `NotAFile`, `NotFound`, `UnsupportedExtension`, `OpenFailed` or `InvalidPackaging`;
/// see [`validate::validate_package`].
pub fn validate(path: &Path) -> Result<(), ContainerError> {
    info!(archive = %path.display(), "validating packaging");
    validate::validate_package(path)?;
    info!(archive = %path.display(), "packaging is valid");
    Ok(())
}

/// List entry names in storage order, directory entries included.
///
/// Checksums are not verified; see [`verify`] for that.
///
/// # Errors
///
/// `NotAFile`, `NotFound`, `UnsupportedExtension`, `OpenFailed`, and the
/// per-entry errors of [`extract::run`].
pub fn list_entries(path: &Path, password: Option<&str>) -> Result<Vec<String>, ContainerError> {
    let path = check_archive_path(path)?;

    let options = ExtractOptions::listing().with_password(password.map(str::to_string));
    run_on_archive(&path, &options)
}

/// Metadata of every entry in storage order, without decompressing data.
///
/// Record names keep their stored separators.
pub fn describe_entries(
    path: &Path,
    password: Option<&str>,
) -> Result<Vec<EntryRecord>, ContainerError> {
    let path = check_archive_path(path)?;

    let mut reader = ArchiveReader::open(&path)?;
    let records = extract::describe(&mut reader, password)?;

    info!(archive = %path.display(), entries = records.len(), "described archive");
    Ok(records)
}

/// List entry names like [`list_entries`], decompressing every entry and
/// failing on the first CRC-32 mismatch.
pub fn verify(path: &Path, password: Option<&str>) -> Result<Vec<String>, ContainerError> {
    let path = check_archive_path(path)?;

    let options = ExtractOptions::default().with_password(password.map(str::to_string));
    run_on_archive(&path, &options)
}

/// Read the decompressed bytes of one entry.
///
/// `entry_name` is matched ignoring ASCII case.
///
/// # Errors
///
/// `NotFound`, `UnsupportedExtension`, `OpenFailed`, `Encoding`,
/// `EntryNotFound` (carrying `entry_name`), password errors, `UnzipFailed`
/// and `ChecksumMismatch`.
pub fn read_entry(
    archive_path: &Path,
    entry_name: &str,
    password: Option<&str>,
) -> Result<Vec<u8>, ContainerError> {
    let archive_path = check_archive_path(archive_path)?;
    info!(archive = %archive_path.display(), entry = entry_name, "reading entry");

    let mut reader = ArchiveReader::open(&archive_path)?;
    reader.locate(entry_name)?;
    let data = extract::read_current(&mut reader, password)?;

    info!(archive = %archive_path.display(), entry = entry_name, bytes = data.len(), "read entry");
    Ok(data)
}

/// Unpack the archive into `destination` and return the entry names in
/// storage order.
///
/// With `overwrite` an existing destination directory is deleted first;
/// without it an existing destination is an error and nothing is touched.
///
/// # Errors
///
/// `NotFound`, `UnsupportedExtension`, `NotADirectory`, `AlreadyExists`,
/// `OpenFailed`, and the per-entry errors of [`extract::run`].
pub fn extract(
    archive_path: &Path,
    destination: &Path,
    password: Option<&str>,
    overwrite: bool,
) -> Result<Vec<String>, ContainerError> {
    let archive_path = check_archive_path(archive_path)?;
    extract::prepare_destination(destination, overwrite)?;

    let options = ExtractOptions::to_directory(destination)
        .with_overwrite(overwrite)
        .with_password(password.map(str::to_string));
    run_on_archive(&archive_path, &options)
}

fn run_on_archive(path: &Path, options: &ExtractOptions) -> Result<Vec<String>, ContainerError> {
    info!(archive = %path.display(), destination = ?options.destination, "processing archive");

    let mut reader = ArchiveReader::open(path)?;
    let entries = extract::run(&mut reader, options)?;

    info!(
        archive = %path.display(),
        destination = ?options.destination,
        entries = entries.len(),
        "processed archive"
    );
    Ok(entries)
}

/// Entry point combining validation with listing or extraction.
#[derive(Debug, Clone, Default)]
pub struct EpubParser {
    config: ParserConfig,
}

impl EpubParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Optionally validate the packaging, then extract into `destination`
    /// (following the configured overwrite policy) or, without one, list the
    /// entries.
    pub fn parse(
        &self,
        path: &Path,
        password: Option<&str>,
        destination: Option<&Path>,
    ) -> Result<Vec<String>, ContainerError> {
        if self.config.validate_package {
            validate(path)?;
        }

        match destination {
            Some(destination) => extract(path, destination, password, self.config.overwrite),
            None => list_entries(path, password),
        }
    }
}
