//! Small building blocks shared by the debhub crates: multi-algorithm digests, atomic file
//! replacement and a few path and duration helpers.

pub mod error;
pub mod fs;
pub mod hash;
pub mod path;
pub mod time;
