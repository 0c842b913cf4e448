//! Command-line interface for EPUB containers.
//!
//! Lists, reads, verifies and extracts the entries of `.epub` and `.zip`
//! files, and checks the EPUB mimetype packaging rule.

use clap::{Parser, Subcommand};
use epub_container::paths::file_path_from_location;
use epub_container::{EntryRecord, EpubParser, ParserConfig};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::process;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "epubunzip")]
#[command(version, about = "Inspect and extract EPUB containers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List entry names in storage order
    List {
        /// Archive path or file:// URL
        archive: String,

        /// Password for encrypted entries
        #[arg(long)]
        password: Option<String>,

        /// Output entry records (sizes, CRC-32, timestamp) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the bytes of one entry to stdout or a file
    Read {
        /// Archive path or file:// URL
        archive: String,

        /// Entry name, matched ignoring ASCII case
        entry: String,

        /// Password for encrypted entries
        #[arg(long)]
        password: Option<String>,

        /// Output file or file:// URL instead of stdout
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Unpack the archive into a directory
    Extract {
        /// Archive path or file:// URL
        archive: String,

        /// Output directory or file:// URL
        #[arg(short, long)]
        out: String,

        /// Password for encrypted entries
        #[arg(long)]
        password: Option<String>,

        /// Fail instead of replacing an existing output directory
        #[arg(long)]
        no_overwrite: bool,

        /// Check the EPUB packaging before extracting
        #[arg(long)]
        validate: bool,
    },

    /// Check the EPUB mimetype packaging rule
    Validate {
        /// Archive path or file:// URL
        archive: String,
    },

    /// Decompress every entry and compare its CRC-32
    Verify {
        /// Archive path or file:// URL
        archive: String,

        /// Password for encrypted entries
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Serialize)]
struct Listing<'a> {
    archive: String,
    entries: &'a [EntryRecord],
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List {
            archive,
            password,
            json,
        } => handle_list(archive, password, json),
        Commands::Read {
            archive,
            entry,
            password,
            out,
        } => handle_read(archive, entry, password, out),
        Commands::Extract {
            archive,
            out,
            password,
            no_overwrite,
            validate,
        } => handle_extract(archive, out, password, !no_overwrite, validate),
        Commands::Validate { archive } => handle_validate(archive),
        Commands::Verify { archive, password } => handle_verify(archive, password),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn handle_list(
    archive: String,
    password: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = file_path_from_location(&archive)?;

    if json {
        let records = epub_container::describe_entries(&path, password.as_deref())?;
        let listing = Listing {
            archive: path.display().to_string(),
            entries: &records,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        let parser = EpubParser::default();
        for name in parser.parse(&path, password.as_deref(), None)? {
            println!("{}", name);
        }
    }
    Ok(())
}

fn handle_read(
    archive: String,
    entry: String,
    password: Option<String>,
    out: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = file_path_from_location(&archive)?;
    let data = epub_container::read_entry(&path, &entry, password.as_deref())?;

    match out.as_deref().map(file_path_from_location).transpose()? {
        Some(out) => {
            fs::write(&out, &data)?;
            info!(path = %out.display(), bytes = data.len(), "wrote entry");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn handle_extract(
    archive: String,
    out: String,
    password: Option<String>,
    overwrite: bool,
    validate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = file_path_from_location(&archive)?;
    let out = file_path_from_location(&out)?;

    let parser = extract_parser(validate, overwrite);
    let entries = parser.parse(&path, password.as_deref(), Some(&out))?;
    println!("Extracted {} entries to {}", entries.len(), out.display());
    Ok(())
}

fn extract_parser(validate: bool, overwrite: bool) -> EpubParser {
    EpubParser::new(ParserConfig {
        validate_package: validate,
        overwrite,
    })
}

fn handle_validate(archive: String) -> Result<(), Box<dyn std::error::Error>> {
    let path = file_path_from_location(&archive)?;
    epub_container::validate(&path)?;
    println!("{}: valid EPUB packaging", path.display());
    Ok(())
}

fn handle_verify(
    archive: String,
    password: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = file_path_from_location(&archive)?;
    let entries = epub_container::verify(&path, password.as_deref())?;
    println!("{}: {} entries, all checksums match", path.display(), entries.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_with_json() {
        let cli = Cli::try_parse_from(["epubunzip", "list", "book.epub", "--json"]).unwrap();
        match cli.command {
            Commands::List {
                archive,
                password,
                json,
            } => {
                assert_eq!(archive, "book.epub");
                assert_eq!(password, None);
                assert!(json);
            }
            other => panic!("Expected list command, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_read_with_output() {
        let cli = Cli::try_parse_from([
            "epubunzip",
            "read",
            "book.epub",
            "OEBPS/content.opf",
            "--password",
            "secret",
            "-o",
            "content.opf",
        ])
        .unwrap();
        match cli.command {
            Commands::Read {
                entry, password, out, ..
            } => {
                assert_eq!(entry, "OEBPS/content.opf");
                assert_eq!(password.as_deref(), Some("secret"));
                assert_eq!(out.as_deref(), Some("content.opf"));
            }
            other => panic!("Expected read command, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_extract_flags() {
        let cli = Cli::try_parse_from([
            "epubunzip",
            "extract",
            "file:///tmp/book.epub",
            "--out",
            "output",
            "--no-overwrite",
            "--validate",
        ])
        .unwrap();
        match cli.command {
            Commands::Extract {
                archive,
                out,
                no_overwrite,
                validate,
                ..
            } => {
                assert_eq!(archive, "file:///tmp/book.epub");
                assert_eq!(out, "output");
                assert!(no_overwrite);
                assert!(validate);
            }
            other => panic!("Expected extract command, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_requires_output() {
        assert!(Cli::try_parse_from(["epubunzip", "extract", "book.epub"]).is_err());
    }

    #[test]
    fn test_parse_validate_and_verify() {
        let cli = Cli::try_parse_from(["epubunzip", "validate", "book.epub"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate { .. }));

        let cli =
            Cli::try_parse_from(["epubunzip", "verify", "book.zip", "--password", "pw"]).unwrap();
        match cli.command {
            Commands::Verify { archive, password } => {
                assert_eq!(archive, "book.zip");
                assert_eq!(password.as_deref(), Some("pw"));
            }
            other => panic!("Expected verify command, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_parser_config() {
        let parser = extract_parser(true, false);
        assert!(parser.config().validate_package);
        assert!(!parser.config().overwrite);

        let parser = extract_parser(false, true);
        assert!(!parser.config().validate_package);
        assert!(parser.config().overwrite);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["epubunzip", "unpack", "book.epub"]).is_err());
    }
}
