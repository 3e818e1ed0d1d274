use std::path::Path;

use figment::{
    providers::{Data, Format, Json, Yaml},
    value::{Dict, Map},
    Error, Metadata, Profile, Provider,
};

/// A file-backed provider whose contents are read once, up front.
///
/// `figment`'s own file providers defer reading until the configuration is extracted, which would turn a missing or
/// malformed file into a confusing error much later. Reading eagerly surfaces it at load time instead.
pub struct FileProvider {
    data: Map<Profile, Dict>,
    metadata: Metadata,
}

impl FileProvider {
    pub fn from_yaml<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        Self::from_format::<Yaml, _>("YAML file", path)
    }

    pub fn from_json<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        Self::from_format::<Json, _>("JSON file", path)
    }

    fn from_format<F, P>(name: &'static str, path: P) -> Result<Self, Error>
    where
        F: Format,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        let data = Data::<F>::string(&contents).data()?;

        Ok(Self {
            data,
            metadata: Metadata::from(name, path),
        })
    }
}

impl Provider for FileProvider {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Ok(self.data.clone())
    }
}
