//! Extraction engine: walks the reader's entries and either lists them or
//! unpacks them into a destination directory.

use crate::error::ContainerError;
use crate::paths::{join, to_unix_separators};
use crate::reader::{ArchiveReader, EntryRecord, EntryStream};
use crate::safety::validate_entry_path;
use crate::types::{DosTimestamp, ExtractOptions};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Visit every entry from the reader's cursor onwards, in storage order.
///
/// Without a destination in `options` this only lists; with one, each entry
/// is written below it, recreating directories and restoring modification
/// times. The returned names have `\` translated to `/` and include directory
/// entries.
///
/// Files written before a failing entry are left on disk.
///
/// # Errors
///
/// - [`ContainerError::PasswordRequired`] / [`ContainerError::InvalidPassword`]
///   if an entry cannot be decrypted
/// - [`ContainerError::UnzipFailed`] if an entry cannot be opened or read, or
///   has an empty name
/// - [`ContainerError::ChecksumMismatch`] if checksum verification is enabled
///   and an entry's data is corrupt
/// - [`ContainerError::Security`] if an entry name would escape the destination
/// - [`ContainerError::Io`] if writing to the destination fails
pub fn run(
    reader: &mut ArchiveReader,
    options: &ExtractOptions,
) -> Result<Vec<String>, ContainerError> {
    let archive_path = reader.path().to_path_buf();
    let password = options.password.as_deref();
    let mut entries = Vec::with_capacity(reader.len());

    loop {
        let mut stream = reader.open_current(password)?;
        let record = stream.record().clone();

        if record.name.is_empty() {
            return Err(ContainerError::UnzipFailed {
                path: archive_path,
                entry: format!("#{}", entries.len()),
                reason: "entry has an empty name".to_string(),
            });
        }

        let name = to_unix_separators(&record.name).into_owned();
        debug!(
            entry = %name,
            directory = record.is_directory,
            compressed = record.compressed_size,
            size = record.uncompressed_size,
            "visiting entry"
        );
        entries.push(name.clone());

        match options.destination.as_deref() {
            None => {
                if options.verify_checksum {
                    stream.drain()?;
                }
            }
            Some(destination) => {
                let relative = validate_entry_path(&name)?;
                let target = join(destination, &relative);

                if record.is_directory {
                    create_dir_best_effort(&target);
                } else {
                    if let Some(parent) = target.parent() {
                        create_dir_best_effort(parent);
                    }

                    if target.exists() && !options.overwrite {
                        debug!(path = %target.display(), "keeping existing file");
                    } else {
                        write_entry(&mut stream, &target)?;
                        if let Some(modified) = record.modified {
                            restore_modified_time(&target, &modified);
                        }
                    }
                }
            }
        }

        let status = stream.close();
        if options.verify_checksum && status.is_mismatch() {
            return Err(ContainerError::ChecksumMismatch {
                path: archive_path,
                entry: name,
            });
        }

        if !reader.advance() {
            break;
        }
    }

    Ok(entries)
}

/// Prepare `destination` for an extraction run.
///
/// - not existing: created along with missing parents
/// - existing directory, `overwrite`: removed recursively and recreated empty
/// - existing directory, no `overwrite`: [`ContainerError::AlreadyExists`]
/// - existing non-directory: [`ContainerError::NotADirectory`]
pub fn prepare_destination(destination: &Path, overwrite: bool) -> Result<(), ContainerError> {
    match fs::metadata(destination) {
        Ok(meta) if !meta.is_dir() => Err(ContainerError::NotADirectory(destination.to_path_buf())),
        Ok(_) if !overwrite => Err(ContainerError::AlreadyExists(destination.to_path_buf())),
        Ok(_) => {
            debug!(path = %destination.display(), "replacing existing destination");
            fs::remove_dir_all(destination)?;
            fs::create_dir_all(destination)?;
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(destination)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Read the whole entry under the reader's cursor into memory.
///
/// # Errors
///
/// Same as [`ArchiveReader::open_current`], plus
/// [`ContainerError::ChecksumMismatch`] when the data is corrupt.
pub fn read_current(
    reader: &mut ArchiveReader,
    password: Option<&str>,
) -> Result<Vec<u8>, ContainerError> {
    let archive_path = reader.path().to_path_buf();
    let mut stream = reader.open_current(password)?;

    let capacity = usize::try_from(stream.record().uncompressed_size).unwrap_or(0);
    let mut data = Vec::with_capacity(capacity.min(64 * 1024 * 1024));
    for chunk in &mut stream {
        data.extend_from_slice(&chunk?);
    }

    let entry = stream.record().name.clone();
    if stream.close().is_mismatch() {
        return Err(ContainerError::ChecksumMismatch {
            path: archive_path,
            entry,
        });
    }

    Ok(data)
}

/// Collect the metadata of every entry from the reader's cursor onwards,
/// without decompressing anything. Names keep their stored separators.
pub fn describe(
    reader: &mut ArchiveReader,
    password: Option<&str>,
) -> Result<Vec<EntryRecord>, ContainerError> {
    let mut records = Vec::with_capacity(reader.len());

    loop {
        let stream = reader.open_current(password)?;
        records.push(stream.record().clone());
        stream.close();

        if !reader.advance() {
            break;
        }
    }

    Ok(records)
}

fn write_entry(stream: &mut EntryStream<'_>, target: &Path) -> Result<u64, ContainerError> {
    let mut writer = BufWriter::new(File::create(target)?);
    let mut written = 0u64;

    loop {
        let chunk = stream.read_chunk()?;
        if chunk.is_empty() {
            break;
        }
        writer.write_all(chunk)?;
        written += chunk.len() as u64;
    }

    writer.flush()?;
    Ok(written)
}

/// Directory creation is best-effort: a racing creator or an existing
/// directory is not an error, and a real failure resurfaces when the file
/// below it is created.
fn create_dir_best_effort(path: &Path) {
    if let Err(e) = fs::create_dir_all(path) {
        warn!(path = %path.display(), error = %e, "could not create directory");
    }
}

/// Restoring the modification time is best-effort; failures are logged only.
fn restore_modified_time(target: &Path, modified: &DosTimestamp) {
    let Some(time) = modified.to_system_time() else {
        warn!(path = %target.display(), ?modified, "stored timestamp is not a valid local time");
        return;
    };

    let result = File::options()
        .write(true)
        .open(target)
        .and_then(|file| file.set_modified(time));
    if let Err(e) = result {
        warn!(path = %target.display(), error = %e, "could not restore modification time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_destination_creates_missing() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("a/b/out");

        prepare_destination(&destination, false).unwrap();
        assert!(destination.is_dir());
    }

    #[test]
    fn test_prepare_destination_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("out");
        fs::create_dir_all(destination.join("stale")).unwrap();
        fs::write(destination.join("stale/file.txt"), b"old").unwrap();

        prepare_destination(&destination, true).unwrap();
        assert!(destination.is_dir());
        assert_eq!(fs::read_dir(&destination).unwrap().count(), 0);
    }

    #[test]
    fn test_prepare_destination_already_exists() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("out");
        fs::create_dir_all(&destination).unwrap();
        fs::write(destination.join("keep.txt"), b"keep").unwrap();

        let result = prepare_destination(&destination, false);
        assert!(matches!(result, Err(ContainerError::AlreadyExists(_))));
        assert!(destination.join("keep.txt").exists());
    }

    #[test]
    fn test_prepare_destination_not_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("file.txt");
        fs::write(&destination, b"content").unwrap();

        let result = prepare_destination(&destination, true);
        assert!(matches!(result, Err(ContainerError::NotADirectory(_))));
        assert!(destination.is_file());
    }

    #[test]
    fn test_restore_modified_time_missing_file_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let stamp = DosTimestamp {
            year: 2017,
            month: 1,
            day: 8,
            hour: 9,
            minute: 0,
            second: 0,
        };
        restore_modified_time(&temp_dir.path().join("missing.txt"), &stamp);
    }
}
