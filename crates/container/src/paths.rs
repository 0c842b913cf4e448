//! Path normalization helpers.
//!
//! Stored entry names may use either `/` or `\` as separator depending on the
//! tool that produced the archive. Everything here is pure string/path work;
//! nothing touches the filesystem.

use crate::error::ContainerError;
use crate::types::SUPPORTED_EXTENSIONS;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Return the extension of the last segment of `path`, case preserved.
///
/// Both `/` and `\` count as separators. A segment without a dot, or whose
/// only dot is the leading one (`.hidden`), has no extension.
///
/// # Examples
///
/// ```
/// use epub_container::paths::extension_of;
///
/// assert_eq!(extension_of("books/Sample.EPUB"), "EPUB");
/// assert_eq!(extension_of("OEBPS\\toc.ncx"), "ncx");
/// assert_eq!(extension_of("mimetype"), "");
/// ```
pub fn extension_of(path: &str) -> &str {
    let segment = path.rsplit(['/', '\\']).next().unwrap_or(path);

    match segment.rfind('.') {
        Some(idx) if idx > 0 => &segment[idx + 1..],
        _ => "",
    }
}

/// Join a `/`-separated entry name onto `base` with exactly one separator
/// between every pair of segments.
///
/// Empty segments (from doubled or trailing separators) are dropped. This does
/// not police `..` or absolute names; see [`crate::safety`].
pub fn join(base: &Path, child: &str) -> PathBuf {
    let mut joined = base.to_path_buf();
    for segment in to_unix_separators(child).split('/').filter(|s| !s.is_empty()) {
        joined.push(segment);
    }
    joined
}

/// Replace every backslash in `name` with a forward slash.
///
/// Borrows the input unchanged when it contains no backslash.
pub fn to_unix_separators(name: &str) -> Cow<'_, str> {
    if name.contains('\\') {
        Cow::Owned(name.replace('\\', "/"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Whether `path` carries one of the [`SUPPORTED_EXTENSIONS`].
pub fn has_supported_extension(path: &Path) -> bool {
    let extension = extension_of(&path.to_string_lossy()).to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&extension.as_str())
}

/// Resolve a user-supplied location into a local file path.
///
/// Plain paths are returned as-is and `file://` URLs are reduced to their path.
/// Any other `scheme://` location is rejected with
/// [`ContainerError::NotAFile`] before the filesystem is consulted.
pub fn file_path_from_location(location: &str) -> Result<PathBuf, ContainerError> {
    let Some((scheme, rest)) = location.split_once("://") else {
        return Ok(PathBuf::from(location));
    };

    let is_scheme = !scheme.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !is_scheme {
        return Ok(PathBuf::from(location));
    }

    if !scheme.eq_ignore_ascii_case("file") {
        return Err(ContainerError::NotAFile(location.to_string()));
    }

    // file://host/path; only the empty host and "localhost" are local
    let (host, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    if !(host.is_empty() || host.eq_ignore_ascii_case("localhost")) || path.is_empty() {
        return Err(ContainerError::NotAFile(location.to_string()));
    }

    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Sample.epub"), "epub");
        assert_eq!(extension_of("/data/Sample.Zip"), "Zip");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("dir.d/file"), "");
        assert_eq!(extension_of("dir\\sub.d\\file.xhtml"), "xhtml");
        assert_eq!(extension_of(".hidden"), "");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of(""), "");
    }

    #[test]
    fn test_join_single_separator() {
        let base = Path::new("/tmp/out");
        assert_eq!(join(base, "OEBPS/toc.ncx"), Path::new("/tmp/out/OEBPS/toc.ncx"));
        assert_eq!(join(Path::new("/tmp/out/"), "mimetype"), Path::new("/tmp/out/mimetype"));
        assert_eq!(join(base, "/OEBPS//Text/"), Path::new("/tmp/out/OEBPS/Text"));
        assert_eq!(
            join(base, "META-INF\\container.xml"),
            Path::new("/tmp/out/META-INF/container.xml")
        );
    }

    #[test]
    fn test_to_unix_separators() {
        assert_eq!(to_unix_separators("OEBPS\\Text\\a.xhtml"), "OEBPS/Text/a.xhtml");
        assert!(matches!(to_unix_separators("OEBPS/a.xhtml"), Cow::Borrowed(_)));
        assert_eq!(to_unix_separators(""), "");
    }

    #[test]
    fn test_has_supported_extension() {
        assert!(has_supported_extension(Path::new("book.epub")));
        assert!(has_supported_extension(Path::new("book.EPUB")));
        assert!(has_supported_extension(Path::new("archive.zip")));
        assert!(!has_supported_extension(Path::new("comic.cbz")));
        assert!(!has_supported_extension(Path::new("noextension")));
    }

    #[test]
    fn test_location_plain_path() {
        assert_eq!(
            file_path_from_location("books/Sample.epub").unwrap(),
            PathBuf::from("books/Sample.epub")
        );
    }

    #[test]
    fn test_location_file_url() {
        assert_eq!(
            file_path_from_location("file:///tmp/Sample.epub").unwrap(),
            PathBuf::from("/tmp/Sample.epub")
        );
        assert_eq!(
            file_path_from_location("file://localhost/tmp/Sample.epub").unwrap(),
            PathBuf::from("/tmp/Sample.epub")
        );
    }

    #[test]
    fn test_location_remote_url_rejected() {
        let url = "https://github.com/DaVinAhn/EPubParser";
        match file_path_from_location(url) {
            Err(ContainerError::NotAFile(location)) => assert_eq!(location, url),
            other => panic!("Expected NotAFile error, got: {:?}", other),
        }

        assert!(matches!(
            file_path_from_location("file://remote-host/share/a.epub"),
            Err(ContainerError::NotAFile(_))
        ));
    }
}
