//! Safety checks applied before an entry is written to disk.
//!
//! Entry names come straight from the archive and may try to escape the
//! destination (zip-slip). Names are checked after separator normalization,
//! so `..\..\x` is caught the same way as `../../x`.

use crate::error::SecurityError;

/// Validates a `/`-separated entry name and returns its normalized relative form.
///
/// This function performs the following checks:
/// - Rejects absolute names (`/etc/passwd`) and drive or UNC prefixes (`C:/x`)
/// - Rejects names containing a `..` segment
/// - Drops `.` and empty segments
/// - Rejects names that normalize to nothing
///
/// # Examples
///
/// ```
/// use epub_container::safety::validate_entry_path;
///
/// // Valid relative path
/// let safe_path = validate_entry_path("OEBPS/./Text//a.xhtml").unwrap();
/// assert_eq!(safe_path, "OEBPS/Text/a.xhtml");
///
/// // Path traversal attempt - rejected
/// assert!(validate_entry_path("../../etc/passwd").is_err());
///
/// // Absolute path - rejected
/// assert!(validate_entry_path("/etc/passwd").is_err());
/// ```
pub fn validate_entry_path(name: &str) -> Result<String, SecurityError> {
    if name.starts_with('/') {
        return Err(SecurityError::AbsolutePath(name.to_string()));
    }

    let mut normalized: Vec<&str> = Vec::new();

    for (idx, segment) in name.split('/').enumerate() {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(SecurityError::PathTraversal(format!(
                    "Path contains '..' component: {}",
                    name
                )));
            }
            // Windows drive prefix such as "C:"
            s if idx == 0 && s.ends_with(':') => {
                return Err(SecurityError::AbsolutePath(name.to_string()));
            }
            s => normalized.push(s),
        }
    }

    if normalized.is_empty() {
        return Err(SecurityError::PathTraversal(format!(
            "Path normalizes to empty: {:?}",
            name
        )));
    }

    Ok(normalized.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_entry_path_valid() {
        assert_eq!(validate_entry_path("mimetype").unwrap(), "mimetype");
        assert_eq!(
            validate_entry_path("OEBPS/Text/Section0001.xhtml").unwrap(),
            "OEBPS/Text/Section0001.xhtml"
        );
        assert_eq!(
            validate_entry_path("./META-INF/container.xml").unwrap(),
            "META-INF/container.xml"
        );
    }

    #[test]
    fn test_validate_entry_path_directory_entry() {
        assert_eq!(validate_entry_path("OEBPS/Images/").unwrap(), "OEBPS/Images");
    }

    #[test]
    fn test_validate_entry_path_absolute() {
        assert!(matches!(
            validate_entry_path("/etc/passwd"),
            Err(SecurityError::AbsolutePath(_))
        ));
        assert!(matches!(
            validate_entry_path("C:/Windows/system32"),
            Err(SecurityError::AbsolutePath(_))
        ));
        assert!(matches!(
            validate_entry_path("//server/share/file"),
            Err(SecurityError::AbsolutePath(_))
        ));
    }

    #[test]
    fn test_validate_entry_path_zip_slip_variants() {
        // Classic zip-slip
        assert!(validate_entry_path("../../etc/passwd").is_err());

        // Zip-slip in middle of path
        assert!(validate_entry_path("OEBPS/../../etc/passwd").is_err());

        // Zip-slip with current directory obfuscation
        assert!(validate_entry_path("./../etc/passwd").is_err());

        // Parent at end
        assert!(matches!(
            validate_entry_path("OEBPS/.."),
            Err(SecurityError::PathTraversal(_))
        ));
    }

    #[test]
    fn test_validate_entry_path_empty() {
        assert!(validate_entry_path("").is_err());
        assert!(validate_entry_path("./").is_err());
        assert!(validate_entry_path(".//.").is_err());
    }

    #[test]
    fn test_validate_entry_path_unicode() {
        assert_eq!(
            validate_entry_path("日本語/ファイル.xhtml").unwrap(),
            "日本語/ファイル.xhtml"
        );
        assert!(validate_entry_path("日本語/../../etc/passwd").is_err());
    }

    #[test]
    fn test_dotted_names_are_not_traversal() {
        assert_eq!(validate_entry_path("..hidden/a").unwrap(), "..hidden/a");
        assert_eq!(validate_entry_path("a/b..c").unwrap(), "a/b..c");
    }
}
