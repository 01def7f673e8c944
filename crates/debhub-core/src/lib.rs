//! Core of debhub: turns `.deb` assets attached to GitHub releases into an APT repository.
//!
//! Assets are listed by a [`source::ReleaseSource`], loaded once per asset through the
//! [`registry::PackageCache`] (which persists parsed control blocks in a
//! [`cache::DiskCache`]) and assembled by a [`repository::Repository`] into `Packages`,
//! `Packages.gz` and `Release` files. [`index::IndexBuilder`] ties the pieces together.

pub mod cache;
pub mod error;
pub mod index;
pub mod loader;
pub mod origin;
pub mod package;
pub mod registry;
pub mod repository;
pub mod signing;
pub mod source;

#[cfg(test)]
mod testing;

pub use error::{CoreError, CoreResult, ErrorContext, LoadError};
