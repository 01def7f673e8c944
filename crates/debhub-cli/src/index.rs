use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

use debhub_core::{
    index::{IndexBuilder, IndexOptions},
    repository::Repository,
    signing::{SignError, Signer},
    CoreError, CoreResult, ErrorContext,
};
use debhub_utils::fs::replace_file_atomic;
use nu_ansi_term::Color::{Cyan, Green};
use tracing::{debug, info};

use crate::utils::Colored;

pub const PUBLIC_KEY_FILE: &str = "archive.key";

/// Builds the index of `owner[/repo]` and writes it under `output`.
pub fn build_index(
    builder: &IndexBuilder,
    signer: Option<&dyn Signer>,
    owner: &str,
    repo: Option<&str>,
    options: &IndexOptions,
    output: &Path,
) -> CoreResult<()> {
    let started = Instant::now();
    let repository = builder.build(owner, repo, options)?;
    let written = write_repository(&repository, signer, output)?;

    info!(
        "Wrote {} packages ({} files) to {} in {:.2?}",
        Colored(Green, repository.len()),
        written.len(),
        Colored(Cyan, output.join(repository.index_root()).display()),
        started.elapsed()
    );
    Ok(())
}

/// Writes every index file, the `Release` manifest and, with a signer, its signatures and
/// the public key. Returns the written paths.
pub fn write_repository(
    repository: &Repository,
    signer: Option<&dyn Signer>,
    output: &Path,
) -> CoreResult<Vec<PathBuf>> {
    let root = output.join(repository.index_root());
    let mut written = Vec::new();

    for (name, producer) in repository.files() {
        let path = root.join(&name);
        let mut contents = Vec::new();
        producer(&mut contents).with_context(|| format!("rendering {name}"))?;
        write_file(&path, &contents)?;
        written.push(path);
    }

    let mut release = Vec::new();
    repository
        .write_release(&mut release)
        .with_context(|| "rendering Release".to_string())?;
    let path = root.join("Release");
    write_file(&path, &release)?;
    written.push(path);

    if let Some(signer) = signer {
        let mut signature = Vec::new();
        repository.write_release_signature(&mut signature, signer)?;
        let path = root.join("Release.gpg");
        write_file(&path, &signature)?;
        written.push(path);

        let mut in_release = Vec::new();
        repository.write_in_release(&mut in_release, signer)?;
        let path = root.join("InRelease");
        write_file(&path, &in_release)?;
        written.push(path);

        let mut key = Vec::new();
        signer.export_public_key_armored(&mut key)?;
        let path = output.join(PUBLIC_KEY_FILE);
        write_file(&path, &key)?;
        written.push(path);
    }

    Ok(written)
}

fn write_file(path: &Path, contents: &[u8]) -> CoreResult<()> {
    replace_file_atomic(path, contents)?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

/// Prints the armored public key to stdout.
pub fn export_key(signer: Option<&dyn Signer>) -> CoreResult<()> {
    let signer = signer.ok_or(CoreError::Sign(SignError::NoSigningKey))?;

    let mut key = Vec::new();
    signer.export_public_key_armored(&mut key)?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&key)
        .and_then(|_| stdout.flush())
        .with_context(|| "writing public key to stdout".to_string())
}

#[cfg(test)]
mod tests {
    use std::{fs, io, sync::Arc};

    use chrono::DateTime;
    use debhub_core::{
        package::{AssetDescriptor, Component, Package},
        signing::BodyProducer,
    };
    use tempfile::tempdir;

    use super::*;

    struct MarkerSigner;

    impl Signer for MarkerSigner {
        fn sign_detached_armored(
            &self,
            w: &mut dyn Write,
            _body: BodyProducer<'_>,
        ) -> Result<(), SignError> {
            w.write_all(b"DETACHED").map_err(|source| {
                SignError::Io {
                    action: "writing signature",
                    source,
                }
            })
        }

        fn sign_clearsign_inline(
            &self,
            w: &mut dyn Write,
            body: BodyProducer<'_>,
        ) -> Result<(), SignError> {
            let wrap = |w: &mut dyn Write| -> io::Result<()> {
                w.write_all(b"CLEARSIGNED\n")?;
                body(w)
            };
            wrap(w).map_err(|source| {
                SignError::Io {
                    action: "writing signature",
                    source,
                }
            })
        }

        fn export_public_key_armored(&self, w: &mut dyn Write) -> Result<(), SignError> {
            w.write_all(b"KEY").map_err(|source| {
                SignError::Io {
                    action: "writing key",
                    source,
                }
            })
        }
    }

    fn package(name: &str, arch: &str, prerelease: bool) -> Arc<Package> {
        let asset = AssetDescriptor {
            id: 1,
            url: format!("https://example.com/{name}.deb"),
            size: 42,
            updated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
            file_name: format!("{name}_1.0_{arch}.deb"),
            repo_name: "tool".into(),
            tag_name: "v1.0".into(),
            prerelease,
        };
        let control = format!("Package: {name}\nVersion: 1.0\nArchitecture: {arch}\n");
        Arc::new(Package::from_control(&asset, control, &[]).unwrap())
    }

    #[test]
    fn test_write_flat_repository() {
        let dir = tempdir().unwrap();
        let mut repository = Repository::new("o", Some("tool"));
        repository.add(package("foo", "amd64", false));

        let written = write_repository(&repository, None, dir.path()).unwrap();
        let root = dir.path().join("releases");
        assert_eq!(
            written,
            [
                root.join("Packages"),
                root.join("Packages.gz"),
                root.join("Release")
            ]
        );

        let packages = fs::read_to_string(root.join("Packages")).unwrap();
        assert!(packages.starts_with("Package: foo\n"));
        assert!(packages.contains("Filename: pool/v1.0/foo_1.0_amd64.deb\n"));

        let release = fs::read_to_string(root.join("Release")).unwrap();
        assert!(release.contains("Origin: GITHUB-DEB-o-tool\n"));
        assert!(!dir.path().join(PUBLIC_KEY_FILE).exists());
    }

    #[test]
    fn test_write_signed_partitioned_repository() {
        let dir = tempdir().unwrap();
        let mut repository = Repository::new("o", None)
            .with_component(Component::PreReleases)
            .partitioned(true);
        repository.add(package("foo", "arm64", true));

        write_repository(&repository, Some(&MarkerSigner), dir.path()).unwrap();

        let root = dir.path().join("dists/all");
        assert!(root.join("pre-releases/binary-arm64/Packages").is_file());
        assert!(root.join("pre-releases/binary-arm64/Packages.gz").is_file());
        assert_eq!(fs::read(root.join("Release.gpg")).unwrap(), b"DETACHED");

        let release = fs::read_to_string(root.join("Release")).unwrap();
        let in_release = fs::read_to_string(root.join("InRelease")).unwrap();
        assert_eq!(in_release, format!("CLEARSIGNED\n{release}"));
        assert_eq!(fs::read(dir.path().join(PUBLIC_KEY_FILE)).unwrap(), b"KEY");
    }

    #[test]
    fn test_export_key_requires_signer() {
        assert!(matches!(
            export_key(None),
            Err(CoreError::Sign(SignError::NoSigningKey))
        ));
    }
}
