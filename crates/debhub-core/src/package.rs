//! Package model: asset descriptors in, validated and classified packages out.

use std::{fmt, io::Write, str::FromStr};

use chrono::{DateTime, Utc};
use debhub_package::{parse_paragraphs, Paragraph};

use crate::error::LoadError;

/// Suite assigned to packages that name none of the configured suites.
pub const SUITE_ALL: &str = "all";

/// A `.deb` asset as listed by the release source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub id: u64,
    pub url: String,
    pub size: u64,
    pub updated_at: DateTime<Utc>,
    pub file_name: String,
    pub repo_name: String,
    pub tag_name: String,
    pub prerelease: bool,
}

/// Identity of a package inside one repository index. Ordering is by name, then version,
/// then architecture.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
    pub architecture: String,
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.name, self.version, self.architecture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Releases,
    PreReleases,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Releases, Component::PreReleases];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::Releases => "releases",
            Component::PreReleases => "pre-releases",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "releases" => Ok(Component::Releases),
            "pre-releases" => Ok(Component::PreReleases),
            other => Err(format!("unknown component '{other}', expected releases or pre-releases")),
        }
    }
}

/// A successfully loaded package. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct Package {
    key: PackageKey,
    control: String,
    fields: Paragraph,
    pub repo_name: String,
    pub tag_name: String,
    pub file_name: String,
    pub download_url: String,
    pub file_size: u64,
    pub updated_at: DateTime<Utc>,
    pub suite: String,
    pub component: Component,
}

impl Package {
    /// Builds a package from an augmented control block.
    ///
    /// The block must hold exactly one paragraph with non-empty `Package`, `Version` and
    /// `Architecture` fields. The component follows the release's prerelease flag; the suite is
    /// the first of `suites` contained in the version or the file name, else [`SUITE_ALL`].
    pub fn from_control(
        asset: &AssetDescriptor,
        control: String,
        suites: &[String],
    ) -> Result<Self, LoadError> {
        let mut paragraphs = parse_paragraphs(&control)?;
        let fields = match paragraphs.len() {
            1 => paragraphs.remove(0),
            0 => return Err(LoadError::MalformedControl("no paragraphs".into())),
            n => return Err(LoadError::MalformedControl(format!("{n} paragraphs"))),
        };

        let required = |field: &'static str| {
            fields
                .get(field)
                .filter(|value| !value.is_empty())
                .map(String::from)
                .ok_or(LoadError::MissingField(field))
        };
        let key = PackageKey {
            name: required("Package")?,
            version: required("Version")?,
            architecture: required("Architecture")?,
        };

        let component = if asset.prerelease {
            Component::PreReleases
        } else {
            Component::Releases
        };
        let suite = classify_suite(&key.version, &asset.file_name, suites);

        Ok(Self {
            key,
            control,
            fields,
            repo_name: asset.repo_name.clone(),
            tag_name: asset.tag_name.clone(),
            file_name: asset.file_name.clone(),
            download_url: asset.url.clone(),
            file_size: asset.size,
            updated_at: asset.updated_at,
            suite,
            component,
        })
    }

    pub fn key(&self) -> &PackageKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn version(&self) -> &str {
        &self.key.version
    }

    pub fn architecture(&self) -> &str {
        &self.key.architecture
    }

    /// Augmented control text, digest lines included.
    pub fn control(&self) -> &str {
        &self.control
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    /// Download path written into `Packages`. The repository segment is only present for
    /// indices spanning several repositories.
    pub fn pool_path(&self, with_repo: bool) -> String {
        if with_repo {
            format!("pool/{}/{}/{}", self.repo_name, self.tag_name, self.file_name)
        } else {
            format!("pool/{}/{}", self.tag_name, self.file_name)
        }
    }

    /// Writes this package's `Packages` stanza.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W, with_repo: bool) -> std::io::Result<()> {
        w.write_all(self.control.as_bytes())?;
        writeln!(w, "Filename: {}", self.pool_path(with_repo))?;
        writeln!(w, "Size: {}", self.file_size)?;
        writeln!(w)
    }

    /// `""` accepts only suite-less packages; any other filter also accepts its own suite.
    pub fn matches_suite(&self, suite: &str) -> bool {
        self.suite == SUITE_ALL || (!suite.is_empty() && self.suite == suite)
    }

    pub fn matches_architecture(&self, architecture: &str) -> bool {
        self.key.architecture == architecture
    }

    pub fn matches_component(&self, component: Component) -> bool {
        self.component == component
    }
}

fn classify_suite(version: &str, file_name: &str, suites: &[String]) -> String {
    suites
        .iter()
        .find(|suite| version.contains(suite.as_str()) || file_name.contains(suite.as_str()))
        .cloned()
        .unwrap_or_else(|| SUITE_ALL.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn asset(id: u64, file_name: &str) -> AssetDescriptor {
        AssetDescriptor {
            id,
            url: format!("https://github.com/o/tool/releases/download/v1/{file_name}"),
            size: 1024,
            updated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            file_name: file_name.to_string(),
            repo_name: "tool".into(),
            tag_name: "v1".into(),
            prerelease: false,
        }
    }

    pub(crate) fn package(name: &str, version: &str, architecture: &str) -> Package {
        let control =
            format!("Package: {name}\nVersion: {version}\nArchitecture: {architecture}\n");
        Package::from_control(
            &asset(1, &format!("{name}_{version}_{architecture}.deb")),
            control,
            &[],
        )
        .unwrap()
    }

    fn suites() -> Vec<String> {
        vec!["bionic".into(), "xenial".into()]
    }

    #[test]
    fn test_from_control() {
        let pkg = package("foo", "1.0", "amd64");
        assert_eq!(
            pkg.key(),
            &PackageKey {
                name: "foo".into(),
                version: "1.0".into(),
                architecture: "amd64".into(),
            }
        );
        assert_eq!(pkg.suite, SUITE_ALL);
        assert_eq!(pkg.component, Component::Releases);
        assert_eq!(pkg.field("Architecture"), Some("amd64"));
        assert_eq!(pkg.file_size, 1024);
    }

    #[test]
    fn test_paragraph_count() {
        let asset = asset(1, "foo.deb");
        assert!(matches!(
            Package::from_control(&asset, String::new(), &[]),
            Err(LoadError::MalformedControl(_))
        ));
        assert!(matches!(
            Package::from_control(&asset, "Package: a\n\nPackage: b\n".into(), &[]),
            Err(LoadError::MalformedControl(_))
        ));
    }

    #[test]
    fn test_missing_fields() {
        let asset = asset(1, "foo.deb");
        assert_eq!(
            Package::from_control(&asset, "Version: 1\nArchitecture: all\n".into(), &[])
                .unwrap_err(),
            LoadError::MissingField("Package")
        );
        assert_eq!(
            Package::from_control(&asset, "Package: a\nVersion:\nArchitecture: all\n".into(), &[])
                .unwrap_err(),
            LoadError::MissingField("Version")
        );
        assert_eq!(
            Package::from_control(&asset, "Package: a\nVersion: 1\n".into(), &[]).unwrap_err(),
            LoadError::MissingField("Architecture")
        );
    }

    #[test]
    fn test_component_from_prerelease() {
        let mut asset = asset(1, "foo.deb");
        asset.prerelease = true;
        let pkg = Package::from_control(
            &asset,
            "Package: foo\nVersion: 1\nArchitecture: all\n".into(),
            &[],
        )
        .unwrap();
        assert_eq!(pkg.component, Component::PreReleases);
        assert!(pkg.matches_component(Component::PreReleases));
        assert!(!pkg.matches_component(Component::Releases));
    }

    #[test]
    fn test_suite_classification_first_match_wins() {
        assert_eq!(classify_suite("1.0~bionic", "foo.deb", &suites()), "bionic");
        assert_eq!(classify_suite("1.0", "foo_xenial_amd64.deb", &suites()), "xenial");
        assert_eq!(
            classify_suite("1.0-xenial", "foo_bionic_amd64.deb", &suites()),
            "bionic"
        );
        assert_eq!(classify_suite("1.0", "foo.deb", &suites()), SUITE_ALL);
        assert_eq!(classify_suite("1.0~bionic", "foo.deb", &[]), SUITE_ALL);
    }

    #[test]
    fn test_suite_matching() {
        let mut pkg = package("foo", "1.0", "amd64");
        assert!(pkg.matches_suite(""));
        assert!(pkg.matches_suite("bionic"));

        pkg.suite = "bionic".into();
        assert!(!pkg.matches_suite(""));
        assert!(pkg.matches_suite("bionic"));
        assert!(!pkg.matches_suite("xenial"));
    }

    #[test]
    fn test_write_stanza() {
        let pkg = package("foo", "1.0", "amd64");
        let mut out = Vec::new();
        pkg.write(&mut out, false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Package: foo\nVersion: 1.0\nArchitecture: amd64\n\
             Filename: pool/v1/foo_1.0_amd64.deb\nSize: 1024\n\n"
        );
        assert_eq!(pkg.pool_path(true), "pool/tool/v1/foo_1.0_amd64.deb");
    }

    #[test]
    fn test_component_from_str() {
        assert_eq!("releases".parse::<Component>(), Ok(Component::Releases));
        assert_eq!("pre-releases".parse::<Component>(), Ok(Component::PreReleases));
        assert!("nightly".parse::<Component>().is_err());
        assert_eq!(Component::PreReleases.to_string(), "pre-releases");
    }
}
