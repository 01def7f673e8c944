use std::io::{self, Read, Write};

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{HashError, HashResult};

/// Digest algorithms computed for every archive and every generated index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// All algorithms, in the order they appear in control blocks and release manifests.
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha512,
    ];

    /// Field name used when a digest is appended to a package control block.
    pub fn control_field(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5sum",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Section header used in a `Release` manifest.
    pub fn release_field(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5Sum",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }
}

/// Fan-out digest accumulator.
///
/// Every byte written is fed to an MD5, SHA1, SHA256 and SHA512 state and counted, so one pass
/// over a stream yields the full digest set. It implements [`Write`] and can therefore sit at
/// the end of any writer chain.
#[derive(Clone, Default)]
pub struct MultiHash {
    md5: Md5,
    sha1: Sha1,
    sha256: Sha256,
    sha512: Sha512,
    len: u64,
}

impl MultiHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
        self.sha256.update(data);
        self.sha512.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes consumed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the hex digest of everything consumed so far without ending the stream.
    pub fn digest(&self, algorithm: HashAlgorithm) -> String {
        match algorithm {
            HashAlgorithm::Md5 => hex::encode(self.md5.clone().finalize()),
            HashAlgorithm::Sha1 => hex::encode(self.sha1.clone().finalize()),
            HashAlgorithm::Sha256 => hex::encode(self.sha256.clone().finalize()),
            HashAlgorithm::Sha512 => hex::encode(self.sha512.clone().finalize()),
        }
    }

    pub fn finalize(self) -> Digests {
        Digests {
            md5: hex::encode(self.md5.finalize()),
            sha1: hex::encode(self.sha1.finalize()),
            sha256: hex::encode(self.sha256.finalize()),
            sha512: hex::encode(self.sha512.finalize()),
            len: self.len,
        }
    }
}

impl Write for MultiHash {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lowercase hex digests and byte length of a completed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digests {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    pub len: u64,
}

impl Digests {
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
            HashAlgorithm::Sha512 => &self.sha512,
        }
    }
}

/// Computes the full digest set of a reader by consuming it to the end.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the reader returns an error.
///
/// # Example
///
/// ```
/// use debhub_utils::hash::digest_reader;
///
/// let digests = digest_reader(&b"abc"[..]).unwrap();
/// assert_eq!(digests.len, 3);
/// assert_eq!(digests.md5, "900150983cd24fb0d6963f7d28e17f72");
/// ```
pub fn digest_reader<R: Read>(mut reader: R) -> HashResult<Digests> {
    let mut hasher = MultiHash::new();
    io::copy(&mut reader, &mut hasher).map_err(|source| HashError::ReadFailed { source })?;
    Ok(hasher.finalize())
}
