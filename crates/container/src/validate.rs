//! EPUB packaging validation.
//!
//! An EPUB container must start with an uncompressed `mimetype` entry whose
//! content is exactly `application/epub+zip`, without an extra field. That
//! places the literal content at a fixed offset, so the check only needs the
//! first [`ZIP_HEADER_SIZE`] bytes of the file:
//!
//! | offset | size | field                       |
//! |--------|------|-----------------------------|
//! | 0      | 2    | signature `PK`              |
//! | 26     | 2    | file name length (LE)       |
//! | 28     | 2    | extra field length (LE)     |
//! | 30     | 8    | file name                   |
//! | 38     | 20   | payload                     |
//!
//! This is a structural heuristic over the header bytes, not a full ZIP
//! conformance check.

use crate::error::ContainerError;
use crate::paths::{file_path_from_location, has_supported_extension};
use crate::types::{EPUB_MIMETYPE, ZIP_HEADER_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

const MIMETYPE_NAME: &[u8] = b"mimetype";

/// The fields of the first local file header that the check looks at.
struct MimetypeHeader<'a> {
    signature: &'a [u8],
    file_name_length: u16,
    extra_field_length: u16,
    file_name: &'a [u8],
    payload: &'a [u8],
}

impl<'a> MimetypeHeader<'a> {
    fn from_bytes(data: &'a [u8; ZIP_HEADER_SIZE]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(&data[26..30]);

        Ok(Self {
            signature: &data[0..2],
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
            file_name: &data[30..38],
            payload: &data[38..ZIP_HEADER_SIZE],
        })
    }

    fn is_epub_mimetype(&self) -> bool {
        self.signature == b"PK"
            && self.file_name_length as usize == MIMETYPE_NAME.len()
            && self.extra_field_length == 0
            && self.file_name == MIMETYPE_NAME
            && self.payload == EPUB_MIMETYPE.as_bytes()
    }
}

/// Check that the archive at `path` follows the EPUB mimetype convention.
///
/// Nothing on disk is modified.
///
/// # Errors
///
/// Returns, in order of checking:
/// - [`ContainerError::NotAFile`] if `path` is a URL other than `file://`
/// - [`ContainerError::NotFound`] if `path` is not an existing regular file
/// - [`ContainerError::UnsupportedExtension`] if the extension is not `epub` or `zip`
/// - [`ContainerError::OpenFailed`] if the file cannot be read or is shorter
///   than [`ZIP_HEADER_SIZE`] bytes
/// - [`ContainerError::InvalidPackaging`] if any of the header fields is off
pub fn validate_package(path: &Path) -> Result<(), ContainerError> {
    let resolved = check_archive_path(path)?;
    let path = resolved.as_path();

    let mut header = [0u8; ZIP_HEADER_SIZE];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map_err(|e| ContainerError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let parsed = MimetypeHeader::from_bytes(&header).map_err(|e| ContainerError::OpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if !parsed.is_epub_mimetype() {
        debug!(path = %path.display(), "mimetype header check failed");
        return Err(ContainerError::InvalidPackaging(path.to_path_buf()));
    }

    Ok(())
}

/// Common precondition of every public operation: `path`, after resolving a
/// `file://` location, is an existing regular file with a supported extension.
///
/// Returns the resolved path.
pub(crate) fn check_archive_path(path: &Path) -> Result<PathBuf, ContainerError> {
    let path = file_path_from_location(&path.to_string_lossy())?;

    if !path.is_file() {
        return Err(ContainerError::NotFound(path));
    }

    if !has_supported_extension(&path) {
        return Err(ContainerError::UnsupportedExtension(path));
    }

    Ok(path)
}
