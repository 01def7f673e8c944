//! Release signing through GnuPG.

use std::{
    io::{self, Write},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
};

use debhub_config::Config;
use debhub_utils::path::expand_home;
use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Diagnostic, Debug)]
pub enum SignError {
    #[error("gpg not found - install GnuPG to sign releases")]
    #[diagnostic(code(debhub::sign::gpg_not_found))]
    GpgNotFound,

    #[error("No signing key configured")]
    #[diagnostic(
        code(debhub::sign::no_key),
        help("Set `signing_key` in the configuration")
    )]
    NoSigningKey,

    #[error("Signing failed: {0}")]
    #[diagnostic(code(debhub::sign::failed))]
    SignFailed(String),

    #[error("Error while {action}")]
    #[diagnostic(code(debhub::sign::io))]
    Io {
        action: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Produces the bytes to be signed.
pub type BodyProducer<'a> = &'a dyn Fn(&mut dyn Write) -> io::Result<()>;

pub trait Signer: Send + Sync {
    /// Writes an ASCII-armored detached signature of the body (`Release.gpg`).
    fn sign_detached_armored(
        &self,
        w: &mut dyn Write,
        body: BodyProducer<'_>,
    ) -> Result<(), SignError>;

    /// Writes the body wrapped in a clear-text signature (`InRelease`).
    fn sign_clearsign_inline(
        &self,
        w: &mut dyn Write,
        body: BodyProducer<'_>,
    ) -> Result<(), SignError>;

    /// Writes the ASCII-armored public key.
    fn export_public_key_armored(&self, w: &mut dyn Write) -> Result<(), SignError>;
}

/// Signer that shells out to the `gpg` binary.
#[derive(Debug, Clone)]
pub struct GpgSigner {
    gpg: PathBuf,
    key: String,
    home: Option<PathBuf>,
}

impl GpgSigner {
    /// Locates `gpg` on `PATH`.
    pub fn new(key: impl Into<String>, home: Option<PathBuf>) -> Result<Self, SignError> {
        let gpg = which::which("gpg").map_err(|_| SignError::GpgNotFound)?;
        Ok(Self::with_binary(gpg, key, home))
    }

    pub fn with_binary(gpg: PathBuf, key: impl Into<String>, home: Option<PathBuf>) -> Self {
        Self {
            gpg,
            key: key.into(),
            home,
        }
    }

    /// Builds a signer from `signing_key` and `gpg_home`; `None` when no key is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, SignError> {
        config
            .signing_key
            .as_deref()
            .map(|key| Self::new(key, config.gpg_home.as_deref().map(expand_home)))
            .transpose()
    }

    fn args(&self, operation: &[&str]) -> Vec<String> {
        let mut args = vec!["--batch".to_string()];
        if let Some(home) = &self.home {
            args.push("--homedir".into());
            args.push(home.display().to_string());
        }
        args.extend(operation.iter().map(|s| s.to_string()));
        args
    }

    fn sign_args(&self, mode: &str) -> Vec<String> {
        self.args(&["--local-user", &self.key, "--armor", mode])
    }

    fn run(&self, args: Vec<String>, body: Option<BodyProducer<'_>>) -> Result<Vec<u8>, SignError> {
        let input = match body {
            Some(body) => {
                let mut input = Vec::new();
                body(&mut input).map_err(|source| {
                    SignError::Io {
                        action: "rendering signed body",
                        source,
                    }
                })?;
                Some(input)
            }
            None => None,
        };

        debug!(gpg = %self.gpg.display(), ?args, "running gpg");
        let mut child = Command::new(&self.gpg)
            .args(&args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                SignError::Io {
                    action: "starting gpg",
                    source,
                }
            })?;

        let output = thread::scope(|scope| {
            if let (Some(input), Some(mut stdin)) = (input.as_deref(), child.stdin.take()) {
                // gpg reports its own failure on a closed pipe; the exit status decides.
                scope.spawn(move || stdin.write_all(input));
            }
            child.wait_with_output()
        })
        .map_err(|source| {
            SignError::Io {
                action: "waiting for gpg",
                source,
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SignError::SignFailed(stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }

    fn write_output(w: &mut dyn Write, output: &[u8]) -> Result<(), SignError> {
        w.write_all(output).map_err(|source| {
            SignError::Io {
                action: "writing signature",
                source,
            }
        })
    }
}

impl Signer for GpgSigner {
    fn sign_detached_armored(
        &self,
        w: &mut dyn Write,
        body: BodyProducer<'_>,
    ) -> Result<(), SignError> {
        let output = self.run(self.sign_args("--detach-sign"), Some(body))?;
        Self::write_output(w, &output)
    }

    fn sign_clearsign_inline(
        &self,
        w: &mut dyn Write,
        body: BodyProducer<'_>,
    ) -> Result<(), SignError> {
        let output = self.run(self.sign_args("--clearsign"), Some(body))?;
        Self::write_output(w, &output)
    }

    fn export_public_key_armored(&self, w: &mut dyn Write) -> Result<(), SignError> {
        let output = self.run(self.args(&["--armor", "--export", &self.key]), None)?;
        if output.is_empty() {
            return Err(SignError::SignFailed(format!(
                "no public key found for '{}'",
                self.key
            )));
        }
        Self::write_output(w, &output)
    }
}
