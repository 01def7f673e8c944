//! Reader for Debian binary packages.
//!
//! [`parse`] walks the ar container of a `.deb`, validates `debian-binary`, decompresses the
//! control sub-archive and pulls out the `control` file. The raw input is split across two
//! threads: a producer reads fixed-size chunks from the source and feeds each one to a
//! [`MultiHash`] before handing it over a rendezvous-sized channel to the parser. Only a few
//! chunks are alive at any moment, regardless of the package size.

use std::{
    fmt::Write as _,
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
    sync::mpsc::{self, Receiver, SyncSender},
    thread,
};

use bzip2::read::BzDecoder;
use debhub_utils::hash::{Digests, HashAlgorithm, MultiHash};
use flate2::read::GzDecoder;
use tracing::trace;
use xz2::read::XzDecoder;

use crate::{
    ar::ArReader,
    error::{ErrorContext, PackageError, Result},
};

pub const DEBIAN_BINARY: &str = "debian-binary";
pub const SUPPORTED_FORMAT_VERSION: &str = "2.0";

const CHUNK_SIZE: usize = 32 * 1024;
/// Longest `debian-binary` member accepted before the version is compared.
const MAX_VERSION_LEN: u64 = 64;

/// Control block of a package with its digest lines appended, plus the digests of the whole
/// raw archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArchive {
    pub control: String,
    pub digests: Digests,
}

impl ParsedArchive {
    fn new(control: String, digests: Digests) -> Self {
        let mut control = control.trim_end_matches('\n').to_string();
        if !control.is_empty() {
            control.push('\n');
        }
        for algorithm in HashAlgorithm::ALL {
            // Writing into a String cannot fail.
            let _ = writeln!(
                control,
                "{}: {}",
                algorithm.control_field(),
                digests.get(algorithm)
            );
        }

        Self {
            control,
            digests,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlCompression {
    None,
    Gzip,
    Xz,
    Bzip2,
}

impl ControlCompression {
    fn from_member(name: &str) -> Option<Self> {
        match name {
            "control.tar" => Some(Self::None),
            "control.tar.gz" => Some(Self::Gzip),
            "control.tar.xz" => Some(Self::Xz),
            "control.tar.bz2" => Some(Self::Bzip2),
            _ => None,
        }
    }
}

/// Parses a `.deb` stream and returns its augmented control block.
///
/// The whole input is consumed, including data members, so the digests cover every byte.
///
/// # Errors
///
/// * [`PackageError::Source`] if reading `source` fails. This takes precedence over any
///   parse error the truncated stream caused.
/// * [`PackageError::InvalidArchive`] if the ar framing is broken.
/// * [`PackageError::UnsupportedFormat`] if `debian-binary` is not `2.0`.
/// * [`PackageError::MissingMember`] if `debian-binary` does not come first, or the control
///   sub-archive or its `control` entry is missing or unreadable.
/// * [`PackageError::MalformedControl`] if the control file is not UTF-8.
pub fn parse<R: Read + Send>(source: R) -> Result<ParsedArchive> {
    let (tx, rx) = mpsc::sync_channel(1);

    thread::scope(|scope| {
        let producer = scope.spawn(move || tee(source, tx));

        let mut reader = ChannelReader::new(rx);
        let parsed = read_control(&mut reader).and_then(|control| {
            io::copy(&mut reader, &mut io::sink())
                .with_context(|| "draining package stream".into())?;
            Ok(control)
        });
        drop(reader);

        let hashed = producer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("digest thread panicked")));

        match (parsed, hashed) {
            (_, Err(err)) => Err(PackageError::Source(err)),
            (Err(err), Ok(_)) => Err(err),
            (Ok(control), Ok(hasher)) => {
                let digests = hasher.finalize();
                trace!(size = digests.len, "parsed package archive");
                Ok(ParsedArchive::new(control, digests))
            }
        }
    })
}

/// Parses a `.deb` file from disk.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ParsedArchive> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse(BufReader::new(file))
}

/// Reads `source` to the end, hashing each chunk before handing it to the parser.
///
/// Stops early without error once the parser hangs up; the parser's own result decides the
/// outcome in that case.
fn tee<R: Read>(mut source: R, tx: SyncSender<io::Result<Vec<u8>>>) -> io::Result<MultiHash> {
    let mut hasher = MultiHash::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = tx.send(Err(io::Error::new(err.kind(), err.to_string())));
                return Err(err);
            }
        };

        hasher.update(&buf[..n]);
        if tx.send(Ok(buf[..n].to_vec())).is_err() {
            break;
        }
    }

    Ok(hasher)
}

struct ChannelReader {
    rx: Receiver<io::Result<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    fn new(rx: Receiver<io::Result<Vec<u8>>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.chunk.len() {
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(Err(err)) => return Err(err),
                // Producer finished and dropped its sender.
                Err(_) => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn read_control<R: Read>(reader: R) -> Result<String> {
    let mut archive = ArReader::new(reader);
    let mut version_checked = false;
    let mut control = None;

    while let Some(member) = archive.next_member()? {
        if member.name == DEBIAN_BINARY {
            let mut raw = Vec::new();
            (&mut archive)
                .take(MAX_VERSION_LEN + 1)
                .read_to_end(&mut raw)
                .with_context(|| "reading debian-binary".into())?;
            let version = String::from_utf8_lossy(&raw);
            let version = version.trim();
            if raw.len() as u64 > MAX_VERSION_LEN || version != SUPPORTED_FORMAT_VERSION {
                return Err(PackageError::UnsupportedFormat(version.to_string()));
            }
            version_checked = true;
        } else if let Some(compression) = ControlCompression::from_member(&member.name) {
            if !version_checked {
                return Err(PackageError::MissingMember(format!(
                    "{DEBIAN_BINARY} (found {} first)",
                    member.name
                )));
            }
            if control.is_none() {
                control = Some(extract_control(&mut archive, &member.name, compression)?);
            }
        }
    }

    if !version_checked {
        return Err(PackageError::MissingMember(DEBIAN_BINARY.into()));
    }
    let control = control.ok_or_else(|| PackageError::MissingMember("control.tar".into()))?;

    String::from_utf8(control)
        .map_err(|_| PackageError::MalformedControl("control file is not valid UTF-8".into()))
}

fn extract_control<R: Read>(
    member: &mut ArReader<R>,
    member_name: &str,
    compression: ControlCompression,
) -> Result<Vec<u8>> {
    let decoder: Box<dyn Read + '_> = match compression {
        ControlCompression::None => Box::new(member),
        ControlCompression::Gzip => Box::new(GzDecoder::new(member)),
        ControlCompression::Xz => Box::new(XzDecoder::new(member)),
        ControlCompression::Bzip2 => Box::new(BzDecoder::new(member)),
    };

    let unreadable =
        |err: io::Error| PackageError::MissingMember(format!("{member_name} is unreadable: {err}"));

    let mut tar = tar::Archive::new(decoder);
    for entry in tar.entries().map_err(unreadable)? {
        let mut entry = entry.map_err(unreadable)?;
        let is_control = {
            let path = entry.path_bytes();
            matches!(path.as_ref(), b"control" | b"./control")
        };
        if is_control {
            let mut control = Vec::new();
            entry.read_to_end(&mut control).map_err(unreadable)?;
            return Ok(control);
        }
    }

    Err(PackageError::MissingMember(format!(
        "control inside {member_name}"
    )))
}
