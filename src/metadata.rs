use std::path::Path;

use anyhow::{anyhow, Context, Result};
use pelite::{pe32::Pe as _, pe64::Pe as _, FileMap, PeFile, Wrap};

/// Version-resource strings embedded in a compiled artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub product_name: String,
    pub file_version: String,
    pub company_name: String,
    pub comments: String,
}

pub trait MetadataReader {
    fn read(&self, path: &Path) -> Result<ArtifactMetadata>;
}

/// Reads the version resource of a 32- or 64-bit PE image.
#[derive(Debug, Default)]
pub struct PeVersionReader;

impl MetadataReader for PeVersionReader {
    fn read(&self, path: &Path) -> Result<ArtifactMetadata> {
        let map = FileMap::open(path).with_context(|| format!("failed to open {:?}", path))?;
        let file = PeFile::from_bytes(&map).with_context(|| format!("failed to parse {:?} as PE image", path))?;

        let resources = match file {
            Wrap::T32(file) => file.resources(),
            Wrap::T64(file) => file.resources(),
        }
        .with_context(|| format!("{:?} has no resources", path))?;

        let version_info = resources
            .version_info()
            .map_err(|error| anyhow!("{:?} has no version resource: {:?}", path, error))?;

        let Some(&lang) = version_info.translation().first() else {
            log::debug!("{:?} carries no string translations", path);
            return Ok(ArtifactMetadata::default());
        };

        let value = |key: &str| {
            version_info
                .value(lang, key)
                .map(|value| value.trim_end_matches('\0').to_string())
                .unwrap_or_default()
        };

        Ok(ArtifactMetadata {
            product_name: value("ProductName"),
            file_version: value("FileVersion"),
            company_name: value("CompanyName"),
            comments: value("Comments"),
        })
    }
}
