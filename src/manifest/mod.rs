use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf, MAIN_SEPARATOR},
};

use anyhow::{Context, Result};
use quick_xml::Writer;

use self::document::Document;
use crate::{arguments::MultiFlags, cli::bufwrite, error::ValidationError, metadata::ArtifactMetadata};

pub(crate) mod document;

pub const NAMESPACE: &str = "http://schemas.microsoft.com/packaging/2010/07/nuspec.xsd";
pub const EXTENSION: &str = "nuspec";

const REQUIRED_FLAGS: [&str; 2] = ["OutPutDir", "dll"];
const UPDATE_FLAG: &str = "UPDATENUGET";
const DEPENDENCIES_FLAG: &str = "DEPENDENCIES";

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Values of a flag joined by a single space, if the flag was supplied.
pub fn joined(flags: &MultiFlags, key: &str) -> Option<String> {
    flags.get(&key.to_uppercase()).map(|values| values.join(" "))
}

fn required(flags: &MultiFlags, key: &'static str) -> Result<String, ValidationError> {
    joined(flags, key).ok_or(ValidationError::MissingFlag(key))
}

pub fn is_self_update(flags: &MultiFlags) -> bool {
    joined(flags, UPDATE_FLAG).is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

/// `/updateNuGet true` with nothing else: update NuGet and build no manifest.
pub fn is_update_only(flags: &MultiFlags) -> bool {
    is_self_update(flags) && flags.len() == 1
}

pub fn check_required(flags: &MultiFlags) -> Result<(), ValidationError> {
    if is_update_only(flags) {
        return Ok(());
    }

    for key in REQUIRED_FLAGS {
        required(flags, key)?;
    }

    Ok(())
}

/// The `/OutPutDir` value, always ending in a path separator.
pub fn output_dir(flags: &MultiFlags) -> Result<String, ValidationError> {
    let mut dir = required(flags, REQUIRED_FLAGS[0])?;
    if is_blank(&dir) {
        log::warn!("/OutPutDir has no value, writing to the filesystem root");
    }

    if !dir.ends_with('/') && !dir.ends_with('\\') {
        dir.push(MAIN_SEPARATOR);
    }

    Ok(dir)
}

/// The artifact named by `/dll`, relative to the output directory.
pub fn artifact_path(flags: &MultiFlags) -> Result<PathBuf, ValidationError> {
    let dir = output_dir(flags)?;
    let dll = required(flags, REQUIRED_FLAGS[1])?;

    Ok(PathBuf::from(dir + &dll))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub id: String,
    pub version: Option<String>,
}

impl Dependency {
    /// Splits `"<id> <version>"` at the last space, since ids may contain spaces.
    ///
    /// A value without a space is a dependency on any version. Blank values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let dependency = match raw.rsplit_once(' ') {
            Some((id, version)) => Self {
                id: id.trim_end().to_string(),
                version: Some(version.to_string()),
            },
            None => Self {
                id: raw.to_string(),
                version: None,
            },
        };

        Some(dependency)
    }
}

/// Resolved `<metadata>` fields. `None` fields are left out of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub id: Option<String>,
    pub version: Option<String>,
    pub authors: Option<String>,
    pub owners: Option<String>,
    pub license_url: Option<String>,
    pub project_url: Option<String>,
    pub icon_url: Option<String>,
    pub require_license_acceptance: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub dependencies: Vec<Dependency>,
}

impl Metadata {
    /// Picks each field from its flag, falling back to the artifact's version resource.
    pub fn resolve(flags: &MultiFlags, artifact: &ArtifactMetadata) -> Self {
        let field = |key: &str, default: Option<&str>| {
            joined(flags, key)
                .filter(|value| !is_blank(value))
                .or_else(|| default.filter(|value| !is_blank(value)).map(str::to_string))
        };

        let dependencies = flags
            .get(DEPENDENCIES_FLAG)
            .map(|values| values.iter().filter_map(|value| Dependency::parse(value)).collect())
            .unwrap_or_default();

        Self {
            id: field("id", Some(artifact.product_name.as_str())).map(|id| id.replace(' ', "_")),
            version: Some(artifact.file_version.clone()).filter(|value| !is_blank(value)),
            authors: field("authors", Some(artifact.company_name.as_str())),
            owners: field("owners", Some(artifact.company_name.as_str())),
            license_url: field("licenseUrl", None),
            project_url: field("projectUrl", None),
            icon_url: field("iconUrl", None),
            require_license_acceptance: field("requireLicenseAcceptance", Some("false")),
            description: field("description", Some(artifact.comments.as_str())),
            tags: field("tags", None),
            dependencies,
        }
    }

    fn elements(&self) -> [(&'static str, Option<&str>); 10] {
        [
            ("id", self.id.as_deref()),
            ("version", self.version.as_deref()),
            ("authors", self.authors.as_deref()),
            ("owners", self.owners.as_deref()),
            ("licenseUrl", self.license_url.as_deref()),
            ("projectUrl", self.project_url.as_deref()),
            ("iconUrl", self.icon_url.as_deref()),
            ("requireLicenseAcceptance", self.require_license_acceptance.as_deref()),
            ("description", self.description.as_deref()),
            ("tags", self.tags.as_deref()),
        ]
    }

    fn write_to(&self, document: &mut impl Document) -> Result<()> {
        document.declaration("1.0")?;
        document.open("package", &[("xmlns", NAMESPACE)])?;
        document.open("metadata", &[])?;

        for (name, value) in self.elements() {
            if let Some(value) = value {
                document.text_element(name, value)?;
            }
        }

        if !self.dependencies.is_empty() {
            document.open("dependencies", &[])?;
            for dependency in &self.dependencies {
                let mut attributes = vec![("id", dependency.id.as_str())];
                if let Some(version) = &dependency.version {
                    attributes.push(("version", version.as_str()));
                }
                document.empty_element("dependency", &attributes)?;
            }
            document.close("dependencies")?;
        }

        document.close("metadata")?;
        document.close("package")?;
        Ok(())
    }
}

pub struct Manifest {
    metadata: Metadata,
    path: PathBuf,
}

pub trait ManifestDocument {
    fn render(&self) -> Result<String>;
    fn print(&self, out: &mut dyn Write) -> Result<()>;
    fn write(&self) -> Result<()>;
}

impl Manifest {
    /// Resolves every field, then names the file after the resolved id.
    pub fn build(flags: &MultiFlags, artifact: &ArtifactMetadata) -> Result<Self, ValidationError> {
        let dir = output_dir(flags)?;
        required(flags, REQUIRED_FLAGS[1])?;

        let metadata = Metadata::resolve(flags, artifact);
        let path = PathBuf::from(format!("{}{}.{}", dir, metadata.id.as_deref().unwrap_or_default(), EXTENSION));

        log::debug!("resolved {:?} for {:?}", metadata, path);
        Ok(Self { metadata, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestDocument for Manifest {
    fn render(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.metadata.write_to(&mut writer)?;

        String::from_utf8(writer.into_inner()).context("manifest is not valid UTF-8")
    }

    fn print(&self, out: &mut dyn Write) -> Result<()> {
        bufwrite(out, self.render()? + "\n")
    }

    fn write(&self) -> Result<()> {
        let file = File::create(&self.path).with_context(|| format!("failed to create {:?}", self.path))?;
        bufwrite(file, self.render()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::arguments::parse_multi_values;

    fn artifact() -> ArtifactMetadata {
        ArtifactMetadata {
            product_name: "Foo Bar".to_string(),
            file_version: "1.2.3.4".to_string(),
            company_name: "Acme".to_string(),
            comments: "Does foo things".to_string(),
        }
    }

    #[test]
    fn requires_output_dir_first() {
        let flags = parse_multi_values(&["/id", "Foo"]);
        assert_eq!(check_required(&flags), Err(ValidationError::MissingFlag("OutPutDir")));
        assert_eq!(
            ValidationError::MissingFlag("OutPutDir").to_string(),
            "/OutPutDir is a required command."
        );
    }

    #[test]
    fn requires_dll() {
        let flags = parse_multi_values(&["/outputdir", "bin"]);
        assert_eq!(check_required(&flags), Err(ValidationError::MissingFlag("dll")));
        assert!(Manifest::build(&flags, &artifact()).is_err());
    }

    #[test]
    fn update_only_needs_no_other_flags() {
        let flags = parse_multi_values(&["/updateNuGet", "TRUE"]);
        assert!(is_update_only(&flags));
        assert_eq!(check_required(&flags), Ok(()));

        let flags = parse_multi_values(&["/updateNuGet", "true", "/id", "Foo"]);
        assert!(is_self_update(&flags));
        assert!(!is_update_only(&flags));
        assert!(check_required(&flags).is_err());

        let flags = parse_multi_values(&["/updateNuGet", "false"]);
        assert!(!is_self_update(&flags));
        assert!(check_required(&flags).is_err());
    }

    #[test]
    fn output_dir_ends_with_separator() {
        let flags = parse_multi_values(&["/outputdir", "bin/Release/", "/dll", "Foo.dll"]);
        assert_eq!(output_dir(&flags).unwrap(), "bin/Release/");

        let flags = parse_multi_values(&["/outputdir", "bin", "/dll", "Foo.dll"]);
        assert_eq!(output_dir(&flags).unwrap(), format!("bin{MAIN_SEPARATOR}"));
        assert_eq!(artifact_path(&flags).unwrap(), PathBuf::from(format!("bin{MAIN_SEPARATOR}Foo.dll")));
    }

    #[test]
    fn splits_dependency_at_last_space() {
        assert_eq!(
            Dependency::parse("My Package 1.2.3"),
            Some(Dependency {
                id: "My Package".to_string(),
                version: Some("1.2.3".to_string()),
            })
        );
        assert_eq!(
            Dependency::parse("Solo"),
            Some(Dependency {
                id: "Solo".to_string(),
                version: None,
            })
        );
        assert_eq!(Dependency::parse("  "), None);
    }

    #[test]
    fn defaults_come_from_artifact() {
        let flags = parse_multi_values(&["/outputdir", "out/", "/dll", "Foo.dll"]);
        let manifest = Manifest::build(&flags, &artifact()).unwrap();
        let metadata = &manifest.metadata;

        assert_eq!(metadata.id.as_deref(), Some("Foo_Bar"));
        assert_eq!(metadata.authors.as_deref(), Some("Acme"));
        assert_eq!(metadata.owners.as_deref(), Some("Acme"));
        assert_eq!(metadata.description.as_deref(), Some("Does foo things"));
        assert_eq!(metadata.require_license_acceptance.as_deref(), Some("false"));
        assert_eq!(metadata.license_url, None);
        assert_eq!(manifest.path(), Path::new("out/Foo_Bar.nuspec"));
    }

    #[test]
    fn flags_override_defaults_but_not_version() {
        let flags = parse_multi_values(&[
            "/outputdir",
            "out/",
            "/dll",
            "Foo.dll",
            "/id",
            "My",
            "Lib",
            "/authors",
            "Jane",
            "/version",
            "9.9",
            "/description",
            "   ",
        ]);
        let manifest = Manifest::build(&flags, &artifact()).unwrap();
        let metadata = &manifest.metadata;

        assert_eq!(metadata.id.as_deref(), Some("My_Lib"));
        assert_eq!(metadata.authors.as_deref(), Some("Jane"));
        assert_eq!(metadata.version.as_deref(), Some("1.2.3.4"));
        assert_eq!(metadata.description.as_deref(), Some("Does foo things"));
        assert_eq!(manifest.path(), Path::new("out/My_Lib.nuspec"));
    }

    #[test]
    fn missing_id_leaves_bare_extension() {
        let flags = parse_multi_values(&["/outputdir", "out/", "/dll", "Foo.dll"]);
        let manifest = Manifest::build(&flags, &ArtifactMetadata::default()).unwrap();
        assert_eq!(manifest.metadata.id, None);
        assert_eq!(manifest.path(), Path::new("out/.nuspec"));
    }

    #[test]
    fn blank_fields_are_omitted() {
        let flags = parse_multi_values(&["/outputdir", "out/", "/dll", "Foo.dll", "/dependencies"]);
        let xml = Manifest::build(&flags, &ArtifactMetadata::default()).unwrap().render().unwrap();

        assert_eq!(
            xml,
            [
                r#"<?xml version="1.0"?>"#,
                r#"<package xmlns="http://schemas.microsoft.com/packaging/2010/07/nuspec.xsd">"#,
                "  <metadata>",
                "    <requireLicenseAcceptance>false</requireLicenseAcceptance>",
                "  </metadata>",
                "</package>",
            ]
            .join("\n")
        );
    }

    #[test]
    fn renders_fields_and_dependencies_in_order() {
        let flags = parse_multi_values(&[
            "/outputdir",
            "out/",
            "/dll",
            "Foo.dll",
            "/tags",
            "foo",
            "bar",
            "/dependencies",
            "My Package 1.2.3",
            "Other 2.0",
        ]);
        let xml = Manifest::build(&flags, &artifact()).unwrap().render().unwrap();

        let id = xml.find("<id>Foo_Bar</id>").unwrap();
        let version = xml.find("<version>1.2.3.4</version>").unwrap();
        let tags = xml.find("<tags>foo bar</tags>").unwrap();
        let first = xml.find(r#"<dependency id="My Package" version="1.2.3"/>"#).unwrap();
        let second = xml.find(r#"<dependency id="Other" version="2.0"/>"#).unwrap();
        assert!(id < version && version < tags && tags < first && first < second, "{xml}");
    }

    #[test]
    fn absolute_unix_path_reads_as_a_flag() {
        let flags = parse_multi_values(&["/outputdir", "/tmp/out", "/dll", "Foo.dll"]);

        assert!(flags["OUTPUTDIR"].is_empty());
        assert!(flags.contains_key("TMP/OUT"));
        assert_eq!(output_dir(&flags).unwrap(), MAIN_SEPARATOR.to_string());
    }

    #[test]
    fn writes_manifest_to_resolved_path() {
        let dir = tempfile::tempdir_in(".").unwrap();
        let relative = Path::new(".").join(dir.path().file_name().unwrap());
        let output_dir = format!("{}{}", relative.display(), MAIN_SEPARATOR);
        let flags = parse_multi_values(&["/outputdir", output_dir.as_str(), "/dll", "Foo.dll"]);

        let manifest = Manifest::build(&flags, &artifact()).unwrap();
        manifest.write().unwrap();

        assert_eq!(manifest.path(), relative.join("Foo_Bar.nuspec"));
        let xml = fs::read_to_string(dir.path().join("Foo_Bar.nuspec")).unwrap();
        assert!(xml.contains("<id>Foo_Bar</id>"), "{xml}");
    }
}
