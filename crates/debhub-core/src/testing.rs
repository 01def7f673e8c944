//! In-memory archives and a scripted origin for unit tests.

use std::{
    io::{Cursor, Write},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use debhub_dl::{error::DownloadError, http::Download};
use flate2::{write::GzEncoder, Compression};
use parking_lot::Mutex;

use crate::origin::Origin;

pub(crate) const SAMPLE_CONTROL: &str = "Package: foo\nVersion: 1.0\nArchitecture: amd64\n";

pub(crate) fn ar_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut archive = b"!<arch>\n".to_vec();
    for (name, data) in members {
        let header = format!(
            "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
            name,
            0,
            0,
            0,
            "100644",
            data.len()
        );
        archive.extend_from_slice(header.as_bytes());
        archive.extend_from_slice(data);
        if data.len() % 2 == 1 {
            archive.push(b'\n');
        }
    }
    archive
}

pub(crate) fn deb_bytes(control: &str) -> Vec<u8> {
    let mut header = tar::Header::new_gnu();
    header.set_size(control.len() as u64);
    header.set_mode(0o644);
    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_data(&mut header, "control", control.as_bytes())
        .unwrap();
    let tar = builder.into_inner().unwrap();

    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(&tar).unwrap();
    let control_tar = gz.finish().unwrap();

    ar_archive(&[
        ("debian-binary", b"2.0\n"),
        ("control.tar.gz", &control_tar),
        ("data.tar.gz", &[0u8; 512]),
    ])
}

struct Script {
    status: u16,
    etag: Option<String>,
    body: Vec<u8>,
    delay: Duration,
}

/// Origin answering every request from a mutable script and counting requests.
pub(crate) struct FakeOrigin {
    script: Mutex<Script>,
    fetches: AtomicUsize,
}

impl FakeOrigin {
    pub(crate) fn serving(body: Vec<u8>) -> Self {
        Self {
            script: Mutex::new(Script {
                status: 200,
                etag: Some("W/\"etag-1\"".into()),
                body,
                delay: Duration::ZERO,
            }),
            fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_status(&self, status: u16) {
        self.script.lock().status = status;
    }

    pub(crate) fn set_etag(&self, etag: Option<&str>) {
        self.script.lock().etag = etag.map(String::from);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = delay;
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Origin for FakeOrigin {
    fn open(&self, url: &str) -> Result<Download, DownloadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let (status, etag, body, delay) = {
            let script = self.script.lock();
            (
                script.status,
                script.etag.clone(),
                script.body.clone(),
                script.delay,
            )
        };
        thread::sleep(delay);

        if status != 200 {
            return Err(DownloadError::HttpError {
                status,
                url: url.to_string(),
            });
        }
        Ok(Download {
            etag,
            reader: Box::new(Cursor::new(body)),
        })
    }
}
