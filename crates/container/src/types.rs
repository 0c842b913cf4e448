//! Type definitions shared by the reader, the extraction engine and the façade.

use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;

/// Recognized extensions for ZIP-based archives, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["epub", "zip"];

/// Size of the buffer used to stream decompressed entry data.
pub const UNZIP_BUFFER_SIZE: usize = 4096;

/// Number of leading bytes inspected by the packaging validator.
pub const ZIP_HEADER_SIZE: usize = 58;

/// Exact content of the `mimetype` entry of an EPUB container.
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// Options for a run of the extraction engine.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Directory to unpack into; `None` means listing only
    pub destination: Option<PathBuf>,

    /// Replace existing files (and, during setup, the destination itself)
    pub overwrite: bool,

    /// Fail on entries whose decompressed data does not match the stored CRC-32
    pub verify_checksum: bool,

    /// Password applied to every encrypted entry
    pub password: Option<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            destination: None,
            overwrite: true,
            verify_checksum: true,
            password: None,
        }
    }
}

impl ExtractOptions {
    /// Listing-only options: no destination and no checksum verification.
    pub fn listing() -> Self {
        Self {
            verify_checksum: false,
            ..Self::default()
        }
    }

    /// Options that unpack into `destination`.
    pub fn to_directory(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: Some(destination.into()),
            ..Self::default()
        }
    }

    /// Set the password used for encrypted entries.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Set the overwrite policy.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Packed modification time of an entry, decoded into calendar fields.
///
/// `year` is the absolute year and `month` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DosTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DosTimestamp {
    /// Interpret the timestamp in the local time zone.
    ///
    /// Returns `None` for field combinations that do not name a real instant.
    pub fn to_system_time(&self) -> Option<SystemTime> {
        use chrono::{Local, TimeZone};

        Local
            .with_ymd_and_hms(
                self.year.into(),
                self.month.into(),
                self.day.into(),
                self.hour.into(),
                self.minute.into(),
                self.second.into(),
            )
            .earliest()
            .map(SystemTime::from)
    }
}

impl From<zip::DateTime> for DosTimestamp {
    fn from(value: zip::DateTime) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
            day: value.day(),
            hour: value.hour(),
            minute: value.minute(),
            second: value.second(),
        }
    }
}

/// Configuration for [`crate::EpubParser`].
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Run the mimetype packaging check before listing or extracting.
    ///
    /// The check covers the IDPF packaging rules: the ZIP header is intact,
    /// `mimetype` is the first entry, it is stored uncompressed without an
    /// extra field and contains only `application/epub+zip`.
    pub validate_package: bool,

    /// Replace an existing destination directory when extracting
    pub overwrite: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            validate_package: false,
            overwrite: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_options_defaults() {
        let options = ExtractOptions::default();
        assert!(options.destination.is_none());
        assert!(options.overwrite);
        assert!(options.verify_checksum);
        assert!(options.password.is_none());
    }

    #[test]
    fn test_listing_options_skip_checksum() {
        let options = ExtractOptions::listing();
        assert!(options.destination.is_none());
        assert!(!options.verify_checksum);
    }

    #[test]
    fn test_to_directory_builder() {
        let options = ExtractOptions::to_directory("/tmp/out")
            .with_overwrite(false)
            .with_password(Some("secret".to_string()));
        assert_eq!(options.destination, Some(PathBuf::from("/tmp/out")));
        assert!(!options.overwrite);
        assert!(options.verify_checksum);
        assert_eq!(options.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_parser_config_defaults() {
        let config = ParserConfig::default();
        assert!(!config.validate_package);
        assert!(config.overwrite);
    }

    #[test]
    fn test_timestamp_to_system_time() {
        use chrono::{DateTime, Datelike, Local, Timelike};

        let stamp = DosTimestamp {
            year: 2017,
            month: 1,
            day: 8,
            hour: 12,
            minute: 30,
            second: 10,
        };
        let local: DateTime<Local> = stamp.to_system_time().unwrap().into();
        assert_eq!(local.year(), 2017);
        assert_eq!(local.month(), 1);
        assert_eq!(local.day(), 8);
        assert_eq!(local.hour(), 12);
        assert_eq!(local.minute(), 30);
        assert_eq!(local.second(), 10);
    }

    #[test]
    fn test_timestamp_invalid_fields() {
        let stamp = DosTimestamp {
            year: 2017,
            month: 2,
            day: 30,
            hour: 0,
            minute: 0,
            second: 0,
        };
        assert!(stamp.to_system_time().is_none());
    }
}
