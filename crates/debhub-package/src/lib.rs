//! Debian binary package handling for debhub.
//!
//! This crate reads `.deb` archives as a stream: it walks the outer `ar` container, checks the
//! format version, decompresses the control sub-archive (plain, gzip, xz or bzip2) and returns
//! the control block with MD5, SHA1, SHA256 and SHA512 lines of the whole archive appended.
//! It also parses control paragraphs into ordered field maps.
//!
//! # Example
//!
//! ```no_run
//! use debhub_package::{control::parse_paragraphs, deb::parse_file, PackageError};
//!
//! fn package_name(path: &str) -> Result<Option<String>, PackageError> {
//!     let archive = parse_file(path)?;
//!     let paragraphs = parse_paragraphs(&archive.control)?;
//!     Ok(paragraphs
//!         .first()
//!         .and_then(|p| p.get("Package"))
//!         .map(String::from))
//! }
//! ```

pub mod ar;
pub mod control;
pub mod deb;
pub mod error;

pub use control::{parse_paragraphs, Paragraph};
pub use deb::{parse, parse_file, ParsedArchive};
pub use error::{ErrorContext, PackageError, Result};
