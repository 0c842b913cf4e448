//! Cursor-style reader over the entries of a ZIP container.
//!
//! [`ArchiveReader`] owns the open archive and a cursor that starts on the
//! first entry. [`ArchiveReader::open_current`] hands out an [`EntryStream`]
//! that borrows the reader, so the cursor cannot move while an entry is open
//! and the decompression context is released when the stream is closed or
//! dropped on an error path.
//!
//! Entries are visited in central directory order, which is the order the
//! entries were stored in.

use crate::error::ContainerError;
use crate::types::{DosTimestamp, UNZIP_BUFFER_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
const EOCD_SIZE: usize = 22;
const ZIP64_LOCATOR_SIGNATURE: &[u8] = b"PK\x06\x07";
const ZIP64_LOCATOR_SIZE: usize = 20;
const ZIP64_EOCD_SIGNATURE: &[u8] = b"PK\x06\x06";
const ZIP64_EOCD_MIN_SIZE: usize = 56;
const MAX_COMMENT_SIZE: u64 = 65535;

/// Metadata of one stored file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRecord {
    /// Raw stored name, `/`- or `\`-separated
    pub name: String,

    /// Whether the stored name ends with a separator
    pub is_directory: bool,

    /// Compressed size in bytes
    pub compressed_size: u64,

    /// Uncompressed size in bytes
    pub uncompressed_size: u64,

    /// Stored CRC-32 of the uncompressed data
    pub crc32: u32,

    /// Stored modification time; `None` when the packed value is zero or invalid
    pub modified: Option<DosTimestamp>,
}

/// Outcome of the CRC-32 comparison made when an entry is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcStatus {
    /// The decompressed data matches the stored checksum
    Match,

    /// The decompressed data does not match the stored checksum
    Mismatch,

    /// The entry was not read to the end, or carries no usable checksum
    Unchecked,
}

impl CrcStatus {
    pub fn is_mismatch(self) -> bool {
        self == CrcStatus::Mismatch
    }
}

/// An opened ZIP container with a cursor on its current entry.
pub struct ArchiveReader {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
    current: usize,
}

impl ArchiveReader {
    /// Open the container at `path` and position the cursor on the first entry.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::OpenFailed`] if the file cannot be opened,
    /// is not a ZIP container, or holds no entries. Archives storing several
    /// entries under the same name are rejected too, since entries are
    /// addressed by name and the duplicates could not be visited.
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        let open_failed = |reason: String| ContainerError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| open_failed(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let stored = stored_entry_count(&mut reader).map_err(|e| open_failed(e.to_string()))?;
        let archive = ZipArchive::new(reader).map_err(|e| open_failed(e.to_string()))?;

        if archive.is_empty() {
            return Err(open_failed("archive contains no entries".to_string()));
        }

        if let Some(stored) = stored {
            if stored != archive.len() as u64 {
                return Err(open_failed(format!(
                    "archive stores {} entries under {} distinct names",
                    stored,
                    archive.len()
                )));
            }
        }

        debug!(path = %path.display(), entries = archive.len(), "opened archive");

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            current: 0,
        })
    }

    /// Path of the backing archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the archive.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Always false; an empty archive is rejected by [`ArchiveReader::open`].
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Index of the entry under the cursor.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Move the cursor back to the first entry.
    pub fn rewind(&mut self) {
        self.current = 0;
    }

    /// Move the cursor to the next entry in storage order.
    ///
    /// Returns `false`, leaving the cursor in place, when the current entry
    /// is the last one.
    pub fn advance(&mut self) -> bool {
        if self.current + 1 < self.archive.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Move the cursor to the first entry whose name matches `entry_name`,
    /// ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Encoding`] if the name contains a NUL
    /// character (no stored name can), or [`ContainerError::EntryNotFound`]
    /// if nothing matches. The cursor is unchanged on error.
    pub fn locate(&mut self, entry_name: &str) -> Result<(), ContainerError> {
        if entry_name.contains('\0') {
            return Err(ContainerError::Encoding(entry_name.to_string()));
        }

        let index = self
            .archive
            .file_names()
            .position(|name| name.eq_ignore_ascii_case(entry_name))
            .ok_or_else(|| ContainerError::EntryNotFound(entry_name.to_string()))?;

        self.current = index;
        Ok(())
    }

    /// Open the entry under the cursor for streaming reads.
    ///
    /// A password given for an unencrypted entry is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::PasswordRequired`] or
    /// [`ContainerError::InvalidPassword`] when decryption cannot start, and
    /// [`ContainerError::UnzipFailed`] for any other failure.
    pub fn open_current(
        &mut self,
        password: Option<&str>,
    ) -> Result<EntryStream<'_>, ContainerError> {
        let index = self.current;
        let label = self
            .archive
            .file_names()
            .nth(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index));

        let opened = match password {
            Some(pw) => self.archive.by_index_decrypt(index, pw.as_bytes()),
            None => self.archive.by_index(index),
        };
        let file = opened.map_err(|e| {
            ContainerError::from_entry_open(e, &self.path, &label, password.is_some())
        })?;

        let name = file.name().to_string();
        let record = EntryRecord {
            is_directory: name.ends_with('/') || name.ends_with('\\'),
            name,
            compressed_size: file.compressed_size(),
            uncompressed_size: file.size(),
            crc32: file.crc32(),
            modified: file.last_modified().map(DosTimestamp::from),
        };

        Ok(EntryStream {
            archive_path: self.path.clone(),
            record,
            inner: Box::new(file),
            hasher: crc32fast::Hasher::new(),
            buffer: vec![0u8; UNZIP_BUFFER_SIZE],
            password_used: password.is_some(),
            finished: false,
            checksum_failed: false,
        })
    }
}

/// Decompressed data of one open entry.
///
/// Data is produced in chunks of at most [`UNZIP_BUFFER_SIZE`] bytes. The
/// sequence is finite and cannot be restarted; once the end is reached every
/// further read yields an empty chunk.
pub struct EntryStream<'a> {
    archive_path: PathBuf,
    record: EntryRecord,
    inner: Box<dyn Read + 'a>,
    hasher: crc32fast::Hasher,
    buffer: Vec<u8>,
    password_used: bool,
    finished: bool,
    checksum_failed: bool,
}

impl EntryStream<'_> {
    /// Metadata of the open entry.
    pub fn record(&self) -> &EntryRecord {
        &self.record
    }

    /// Read the next chunk of decompressed data.
    ///
    /// An empty slice signals the end of the entry. A checksum failure
    /// detected by the decompressor also ends the entry; it is reported by
    /// [`EntryStream::close`].
    pub fn read_chunk(&mut self) -> Result<&[u8], ContainerError> {
        if self.finished {
            return Ok(&[]);
        }

        loop {
            match self.inner.read(&mut self.buffer) {
                Ok(0) => {
                    self.finished = true;
                    return Ok(&[]);
                }
                Ok(n) => {
                    self.hasher.update(&self.buffer[..n]);
                    return Ok(&self.buffer[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_checksum_error(&e) => {
                    self.finished = true;
                    self.checksum_failed = true;
                    return Ok(&[]);
                }
                Err(e) => {
                    self.finished = true;
                    return Err(ContainerError::UnzipFailed {
                        path: self.archive_path.clone(),
                        entry: self.record.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Read and discard the rest of the entry, returning the number of bytes skipped.
    pub fn drain(&mut self) -> Result<u64, ContainerError> {
        let mut skipped = 0u64;
        loop {
            let chunk = self.read_chunk()?;
            if chunk.is_empty() {
                return Ok(skipped);
            }
            skipped += chunk.len() as u64;
        }
    }

    /// Release the entry and report how its data compared to the stored CRC-32.
    pub fn close(self) -> CrcStatus {
        if self.checksum_failed {
            return CrcStatus::Mismatch;
        }
        if !self.finished {
            return CrcStatus::Unchecked;
        }
        // AE-2 encrypted entries store zero instead of a checksum
        if self.password_used && self.record.crc32 == 0 {
            return CrcStatus::Unchecked;
        }

        if self.hasher.finalize() == self.record.crc32 {
            CrcStatus::Match
        } else {
            CrcStatus::Mismatch
        }
    }
}

impl Iterator for EntryStream<'_> {
    type Item = Result<Vec<u8>, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_chunk() {
            Ok([]) => None,
            Ok(chunk) => Some(Ok(chunk.to_vec())),
            Err(e) => Some(Err(e)),
        }
    }
}

fn is_checksum_error(err: &io::Error) -> bool {
    err.to_string().to_lowercase().contains("checksum")
}

/// Number of records in the central directory, read from the end of central
/// directory record (or its ZIP64 counterpart).
///
/// Returns `None` when no well-formed record is found; the `zip` crate then
/// reports the structural error itself.
fn stored_entry_count<R: Read + Seek>(reader: &mut R) -> io::Result<Option<u64>> {
    let size = reader.seek(SeekFrom::End(0))?;
    if size < EOCD_SIZE as u64 {
        return Ok(None);
    }

    // The record may be followed by a comment of up to 64 KiB
    let search_size = (MAX_COMMENT_SIZE + EOCD_SIZE as u64).min(size);
    let search_start = size - search_size;
    let mut buf = vec![0u8; search_size as usize];
    reader.seek(SeekFrom::Start(search_start))?;
    reader.read_exact(&mut buf)?;

    let found = (0..=buf.len() - EOCD_SIZE).rev().find(|&i| {
        let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
        buf[i..].starts_with(EOCD_SIGNATURE) && comment_len == buf.len() - i - EOCD_SIZE
    });
    let Some(eocd) = found else {
        return Ok(None);
    };

    let mut cursor = Cursor::new(&buf[eocd + 10..eocd + 12]);
    let total_entries = cursor.read_u16::<LittleEndian>()?;
    if total_entries != 0xFFFF {
        return Ok(Some(total_entries.into()));
    }

    // ZIP64: the locator sits right before the classic record
    let eocd_offset = search_start + eocd as u64;
    let Some(locator_offset) = eocd_offset.checked_sub(ZIP64_LOCATOR_SIZE as u64) else {
        return Ok(None);
    };
    let mut locator = [0u8; ZIP64_LOCATOR_SIZE];
    reader.seek(SeekFrom::Start(locator_offset))?;
    reader.read_exact(&mut locator)?;
    if &locator[0..4] != ZIP64_LOCATOR_SIGNATURE {
        return Ok(None);
    }
    let zip64_offset = Cursor::new(&locator[8..16]).read_u64::<LittleEndian>()?;

    let mut record = [0u8; ZIP64_EOCD_MIN_SIZE];
    reader.seek(SeekFrom::Start(zip64_offset))?;
    reader.read_exact(&mut record)?;
    if &record[0..4] != ZIP64_EOCD_SIGNATURE {
        return Ok(None);
    }

    Ok(Some(Cursor::new(&record[32..40]).read_u64::<LittleEndian>()?))
}
