//! Repository index generation.
//!
//! A [`Repository`] collects loaded packages for one owner (and optionally one repository),
//! keeps the first package seen for every [`PackageKey`], and renders `Packages`,
//! `Packages.gz` and the `Release` manifest from them. Output depends only on the set of
//! packages added, not on the order they arrived in, once [`Repository::sort`] has run.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    io::{self, Write},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use debhub_utils::hash::{HashAlgorithm, MultiHash};
use flate2::{write::GzEncoder, Compression};
use tracing::{debug, info};

use crate::{
    package::{Component, Package, PackageKey, SUITE_ALL},
    signing::{SignError, Signer},
};

/// Writes the content of one generated file.
pub type FileProducer<'a> = Box<dyn Fn(&mut dyn Write) -> io::Result<()> + 'a>;

const RELEASE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

#[derive(Debug, Clone)]
pub struct Repository {
    owner: String,
    repo: Option<String>,
    suite: String,
    component: Component,
    partitioned: bool,
    packages: Vec<Arc<Package>>,
    seen: HashSet<PackageKey>,
}

impl Repository {
    /// Creates an empty flat index of `releases`. Without `repo` the index spans every
    /// repository of `owner`.
    pub fn new(owner: impl Into<String>, repo: Option<&str>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.map(String::from),
            suite: String::new(),
            component: Component::Releases,
            partitioned: false,
            packages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Restricts the index to `suite` (plus suite-less packages). `""` keeps only
    /// suite-less packages.
    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = suite.into();
        self
    }

    /// Component listed by a flat index.
    pub fn with_component(mut self, component: Component) -> Self {
        self.component = component;
        self
    }

    /// Splits output by component and architecture (`<component>/binary-<arch>/Packages`).
    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = partitioned;
        self
    }

    pub fn is_organization_wide(&self) -> bool {
        self.repo.is_none()
    }

    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    pub fn codename(&self) -> &str {
        if self.suite.is_empty() {
            SUITE_ALL
        } else {
            &self.suite
        }
    }

    /// Directory the generated files live under, relative to the repository URL.
    pub fn index_root(&self) -> String {
        if self.partitioned {
            format!("dists/{}", self.codename())
        } else {
            self.component.to_string()
        }
    }

    /// Adds `package` unless its suite is filtered out or its key is already present.
    /// Returns whether the package was added.
    pub fn add(&mut self, package: Arc<Package>) -> bool {
        if !package.matches_suite(&self.suite) {
            debug!(
                package = %package.key(),
                suite = %package.suite,
                filter = %self.suite,
                "skipping package from another suite"
            );
            return false;
        }

        if !self.seen.insert(package.key().clone()) {
            info!(
                package = %package.key(),
                file = %package.file_name,
                "ignoring duplicate package"
            );
            return false;
        }

        self.packages.push(package);
        true
    }

    pub fn sort(&mut self) {
        self.packages.sort_by(|a, b| a.key().cmp(b.key()));
    }

    pub fn packages(&self) -> &[Arc<Package>] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn architectures(&self) -> BTreeSet<&str> {
        self.packages.iter().map(|p| p.architecture()).collect()
    }

    /// Writes the stanzas of every package accepted by `filter`, in index order.
    pub fn write_packages<F>(&self, w: &mut dyn Write, filter: F) -> io::Result<()>
    where
        F: Fn(&Package) -> bool,
    {
        let with_repo = self.is_organization_wide();
        for package in &self.packages {
            if filter(package) {
                package.write(w, with_repo)?;
            }
        }
        Ok(())
    }

    /// Generated files keyed by path relative to [`Repository::index_root`]. Every
    /// `Packages` file has a gzip sibling.
    pub fn files(&self) -> BTreeMap<String, FileProducer<'_>> {
        let mut files = BTreeMap::new();

        if self.partitioned {
            for architecture in self.architectures() {
                for component in Component::ALL {
                    let dir = format!("{component}/binary-{architecture}");
                    let architecture = architecture.to_string();
                    self.insert_packages(&mut files, &dir, move |p: &Package| {
                        p.matches_component(component) && p.matches_architecture(&architecture)
                    });
                }
            }
        } else {
            let component = self.component;
            self.insert_packages(&mut files, "", move |p: &Package| {
                p.matches_component(component)
            });
        }

        files
    }

    fn insert_packages<'a, F>(
        &'a self,
        files: &mut BTreeMap<String, FileProducer<'a>>,
        dir: &str,
        filter: F,
    ) where
        F: Fn(&Package) -> bool + Clone + 'a,
    {
        let name = if dir.is_empty() {
            "Packages".to_string()
        } else {
            format!("{dir}/Packages")
        };

        let plain = filter.clone();
        files.insert(
            name.clone(),
            Box::new(move |w: &mut dyn Write| self.write_packages(w, &plain)),
        );
        files.insert(
            format!("{name}.gz"),
            Box::new(move |w: &mut dyn Write| {
                let mut gz = GzEncoder::new(w, Compression::default());
                self.write_packages(&mut gz, &filter)?;
                gz.finish()?;
                Ok(())
            }),
        );
    }

    fn origin(&self) -> String {
        match &self.repo {
            Some(repo) => format!("GITHUB-DEB-{}-{repo}", self.owner),
            None => format!("GITHUB-DEB-{}", self.owner),
        }
    }

    fn description(&self) -> String {
        match &self.repo {
            Some(repo) => format!("https://github.com/{}/{repo}", self.owner),
            None => format!("https://github.com/{}", self.owner),
        }
    }

    /// Newest `updated_at` among the held packages; the Unix epoch when there are none.
    pub fn date(&self) -> DateTime<Utc> {
        self.packages
            .iter()
            .map(|p| p.updated_at)
            .max()
            .unwrap_or_default()
    }

    /// Writes the `Release` manifest. Every file from [`Repository::files`] is produced once
    /// into a digest accumulator; nothing is buffered.
    pub fn write_release(&self, w: &mut dyn Write) -> io::Result<()> {
        let mut sums = Vec::new();
        for (name, produce) in self.files() {
            let mut hasher = MultiHash::new();
            produce(&mut hasher)?;
            sums.push((name, hasher.finalize()));
        }

        writeln!(w, "Origin: {}", self.origin())?;
        writeln!(w, "Description: {}", self.description())?;
        writeln!(w, "Date: {}", self.date().format(RELEASE_DATE_FORMAT))?;
        if self.partitioned {
            writeln!(w, "Codename: {}", self.codename())?;
            let components: Vec<_> = Component::ALL.iter().map(|c| c.as_str()).collect();
            writeln!(w, "Components: {}", components.join(" "))?;
        }

        for algorithm in HashAlgorithm::ALL {
            writeln!(w, "{}:", algorithm.release_field())?;
            for (name, digests) in &sums {
                writeln!(w, " {} {} {}", digests.get(algorithm), digests.len, name)?;
            }
        }
        Ok(())
    }

    /// Writes `Release.gpg`.
    pub fn write_release_signature(
        &self,
        w: &mut dyn Write,
        signer: &dyn Signer,
    ) -> Result<(), SignError> {
        signer.sign_detached_armored(w, &|body| self.write_release(body))
    }

    /// Writes `InRelease`.
    pub fn write_in_release(&self, w: &mut dyn Write, signer: &dyn Signer) -> Result<(), SignError> {
        signer.sign_clearsign_inline(w, &|body| self.write_release(body))
    }
}
