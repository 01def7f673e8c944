//! Streaming reader for the Unix `ar` container used by `.deb` files.
//!
//! Members are visited strictly in file order and their data is never buffered: after
//! [`ArReader::next_member`] returns a header, the reader itself yields that member's bytes
//! through [`Read`]. Whatever is left unread is skipped on the next call.

use std::io::{self, Read};

use crate::error::{ErrorContext, PackageError, Result};

/// Global header at the start of every ar archive.
pub const AR_MAGIC_BYTES: [u8; 8] = *b"!<arch>\n";

const HEADER_LEN: usize = 60;
const HEADER_TERMINATOR: &[u8; 2] = b"`\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHeader {
    /// Member name with padding and the GNU-style trailing `/` removed.
    pub name: String,
    pub size: u64,
}

impl MemberHeader {
    fn parse(raw: &[u8; HEADER_LEN]) -> Result<Self> {
        if &raw[58..60] != HEADER_TERMINATOR {
            return Err(PackageError::InvalidArchive(
                "bad member header terminator".into(),
            ));
        }

        let name = String::from_utf8_lossy(&raw[0..16]);
        let name = name.trim_end_matches(' ');
        let name = name.strip_suffix('/').unwrap_or(name).to_string();

        let size = std::str::from_utf8(&raw[48..58])
            .ok()
            .map(str::trim)
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                PackageError::InvalidArchive(format!("bad size field for member `{name}`"))
            })?;

        Ok(Self {
            name,
            size,
        })
    }
}

pub struct ArReader<R> {
    inner: R,
    started: bool,
    remaining: u64,
    padding: bool,
}

impl<R: Read> ArReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            started: false,
            remaining: 0,
            padding: false,
        }
    }

    /// Advances to the next member, returning `None` at a clean end of archive.
    pub fn next_member(&mut self) -> Result<Option<MemberHeader>> {
        if !self.started {
            let mut magic = [0u8; 8];
            let n = read_full(&mut self.inner, &mut magic)
                .with_context(|| "reading archive magic".into())?;
            if n != magic.len() || magic != AR_MAGIC_BYTES {
                return Err(PackageError::InvalidArchive("missing `!<arch>` magic".into()));
            }
            self.started = true;
        }

        self.skip_current()?;

        let mut raw = [0u8; HEADER_LEN];
        let n = read_full(&mut self.inner, &mut raw)
            .with_context(|| "reading member header".into())?;
        if n == 0 {
            return Ok(None);
        }
        if n < HEADER_LEN {
            return Err(PackageError::InvalidArchive("truncated member header".into()));
        }

        let header = MemberHeader::parse(&raw)?;
        self.remaining = header.size;
        self.padding = header.size % 2 == 1;
        Ok(Some(header))
    }

    fn skip_current(&mut self) -> Result<()> {
        if self.remaining > 0 {
            let expected = self.remaining;
            let skipped = io::copy(&mut (&mut self.inner).take(expected), &mut io::sink())
                .with_context(|| "skipping member data".into())?;
            if skipped != expected {
                return Err(PackageError::InvalidArchive("truncated member data".into()));
            }
            self.remaining = 0;
        }

        if self.padding {
            // The alignment byte after the last member is sometimes omitted.
            let mut pad = [0u8; 1];
            read_full(&mut self.inner, &mut pad).with_context(|| "skipping padding".into())?;
            self.padding = false;
        }

        Ok(())
    }
}

impl<R: Read> Read for ArReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive member ended early",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Reads until `buf` is full or the reader hits end of file, returning the byte count.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
