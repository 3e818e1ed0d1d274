//! Loading and querying analysis configuration.
//!
//! Configuration is merged from any number of sources (YAML and JSON files, prefixed environment variables, in-memory
//! values) and then either extracted into a typed structure or queried key by key.
#![deny(warnings)]
#![deny(missing_docs)]

use std::{borrow::Cow, collections::HashSet, sync::Arc};

use figment::{
    error::Kind,
    providers::{Env, Serialized},
    Figment, Provider,
};
pub use figment::value;
use hist_error::GenericError;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

mod provider;
use self::provider::FileProvider;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Help text describing how the field can be set.
        ///
        /// When environment variables were loaded, this includes the matching variable name.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// Requested field did not have the expected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Any other configuration error.
    #[snafu(display("Failed to query configuration."))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        from_figment_error(&HashSet::new(), e)
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum LookupSource {
    Environment { prefix: String },
}

impl LookupSource {
    fn transform_key(&self, key: &str) -> String {
        match self {
            // The prefix is already uppercased with a trailing underscore.
            LookupSource::Environment { prefix } => format!("{}{}", prefix, key.replace('.', "_").to_uppercase()),
        }
    }
}

struct BoxedProvider(Box<dyn Provider + Send + Sync>);

impl Provider for BoxedProvider {
    fn metadata(&self) -> figment::Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<value::Map<figment::Profile, value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// Merges configuration from multiple sources.
///
/// Sources added later take precedence over sources added earlier. Once all sources are added, the loader is consumed
/// either into a typed value ([`into_typed`][Self::into_typed]) or into a [`GenericConfiguration`]
/// ([`into_generic`][Self::into_generic]) for key-based lookups.
///
/// # Supported sources
///
/// - YAML file
/// - JSON file
/// - environment variables (must be prefixed; see [`from_environment`][Self::from_environment])
/// - in-memory serializable values (see [`with_values`][Self::with_values])
#[derive(Default)]
pub struct ConfigurationLoader {
    lookup_sources: HashSet<LookupSource>,
    providers: Vec<BoxedProvider>,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid YAML, an error will be returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<std::path::Path>,
    {
        let provider = FileProvider::from_yaml(&path).map_err(GenericError::from).context(Generic)?;
        self.providers.push(BoxedProvider(Box::new(provider)));
        Ok(self)
    }

    /// Attempts to load the given YAML configuration file, ignoring any errors.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<std::path::Path>,
    {
        match FileProvider::from_yaml(&path) {
            Ok(provider) => self.providers.push(BoxedProvider(Box::new(provider))),
            Err(e) => {
                debug!(error = %e, file_path = %path.as_ref().display(), "Unable to read YAML configuration file. Ignoring.");
            }
        }
        self
    }

    /// Loads the given JSON configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid JSON, an error will be returned.
    pub fn from_json<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<std::path::Path>,
    {
        let provider = FileProvider::from_json(&path).map_err(GenericError::from).context(Generic)?;
        self.providers.push(BoxedProvider(Box::new(provider)));
        Ok(self)
    }

    /// Loads configuration from environment variables.
    ///
    /// An underscore is appended to the prefix if it does not already end with one, so a prefix of `analyze` matches
    /// every variable starting with `ANALYZE_`. The prefix is case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error will be returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_uppercase()
        } else {
            format!("{}_", prefix.to_uppercase())
        };

        // `Env` is not `Send + Sync`, so snapshot it into a serialized provider.
        let values = Env::prefixed(&prefix).data()?;
        if let Some(default_dict) = values.get(&figment::Profile::Default) {
            self.providers
                .push(BoxedProvider(Box::new(Serialized::defaults(default_dict.clone()))));
            self.lookup_sources.insert(LookupSource::Environment { prefix });
        }
        Ok(self)
    }

    /// Adds in-memory values as a configuration source.
    ///
    /// `values` must serialize to a map, such as a struct or a `serde_json::Value` object.
    pub fn with_values<T>(mut self, values: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.providers.push(BoxedProvider(Box::new(Serialized::defaults(values))));
        self
    }

    fn merged(providers: &[BoxedProvider]) -> Figment {
        providers
            .iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider))
    }

    /// Consumes the loader, deserializing the merged configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn into_typed<'a, T>(self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        Self::merged(&self.providers)
            .extract()
            .map_err(|e| from_figment_error(&self.lookup_sources, e))
    }

    /// Consumes the loader and wraps the merged configuration for key-based lookups.
    pub fn into_generic(self) -> GenericConfiguration {
        GenericConfiguration {
            inner: Arc::new(Inner {
                figment: Self::merged(&self.providers),
                lookup_sources: self.lookup_sources,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    lookup_sources: HashSet<LookupSource>,
}

/// A merged configuration, queried by key.
///
/// Keys are of the form `a.b.c`, where periods denote nesting. Given the YAML document
///
/// ```yaml
/// histograms:
///   category: hh_3l_OS_Tight/sel/evt
/// ```
///
/// the key `histograms.category` resolves to `"hh_3l_OS_Tight/sel/evt"`.
///
/// Cloning is cheap: clones share the same underlying configuration.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.inner.figment.extract_inner(key) {
            Ok(value) => Ok(value),
            Err(e) if matches!(e.kind, Kind::MissingField(_)) => {
                // Nested keys only present in the environment are flattened with underscores, so retry that way.
                let fallback_key = key.replace('.', "_");
                self.inner
                    .figment
                    .extract_inner(&fallback_key)
                    .map_err(|fallback_e| from_figment_error(&self.inner.lookup_sources, fallback_e))
            }
            Err(e) => Err(from_figment_error(&self.inner.lookup_sources, e)),
        }
    }

    /// Gets a configuration value by key.
    ///
    /// # Errors
    ///
    /// If the key does not exist, or the value could not be deserialized into `T`, an error will be returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.get(key)
    }

    /// Gets a configuration value by key, falling back to `T::default()` on any error.
    ///
    /// This swallows deserialization errors as well as missing keys, so use it sparingly.
    pub fn get_typed_or_default<'a, T>(&self, key: &str) -> T
    where
        T: Default + Deserialize<'a>,
    {
        self.get(key).unwrap_or_default()
    }

    /// Gets a configuration value by key, if it exists.
    ///
    /// # Errors
    ///
    /// If the key exists but the value could not be deserialized into `T`, an error will be returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn from_figment_error(lookup_sources: &HashSet<LookupSource>, e: figment::Error) -> ConfigurationError {
    match e.kind {
        Kind::MissingField(field) => {
            let mut valid_keys = lookup_sources
                .iter()
                .map(|source| source.transform_key(&field))
                .collect::<Vec<_>>();
            valid_keys.insert(0, field.to_string());

            let help_text = format!("Try setting `{}`.", valid_keys.join("` or `"));

            ConfigurationError::MissingField { help_text, field }
        }
        Kind::InvalidType(actual_ty, expected_ty) => ConfigurationError::InvalidFieldType {
            field: e.path.join("."),
            expected_ty,
            actual_ty: actual_ty.to_string(),
        },
        _ => ConfigurationError::Generic { source: e.into() },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use serde_json::json;

    use super::*;

    fn from_json_values(values: serde_json::Value) -> GenericConfiguration {
        ConfigurationLoader::default().with_values(values).into_generic()
    }

    #[test]
    fn get_typed_nested_key() {
        let config = from_json_values(json!({ "histograms": { "process": "TTW" } }));

        let process: String = config.get_typed("histograms.process").unwrap();
        assert_eq!(process, "TTW");
    }

    #[test]
    fn missing_field_reports_key() {
        let config = from_json_values(json!({ "process": "signal" }));

        match config.get_typed::<String>("era") {
            Err(ConfigurationError::MissingField { field, help_text }) => {
                assert_eq!(field, "era");
                assert!(help_text.contains("`era`"));
            }
            other => panic!("expected missing field error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn try_get_typed_missing_is_none() {
        let config = from_json_values(json!({ "process": "signal" }));

        let value: Option<String> = config.try_get_typed("central_or_shift").unwrap();
        assert!(value.is_none());
        assert_eq!(config.get_typed_or_default::<String>("central_or_shift"), "");
    }

    #[test]
    fn invalid_type_is_reported() {
        let config = from_json_values(json!({ "num_events": "many" }));

        let err = config.get_typed::<u64>("num_events").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidFieldType { .. }));
    }

    #[test]
    fn later_sources_take_precedence() {
        let config = ConfigurationLoader::default()
            .with_values(json!({ "era": "2016", "process": "signal" }))
            .with_values(json!({ "era": "2017" }))
            .into_generic();

        assert_eq!(config.get_typed::<String>("era").unwrap(), "2017");
        assert_eq!(config.get_typed::<String>("process").unwrap(), "signal");
    }

    #[test]
    fn yaml_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "era: \"2018\"\ncategory: hh_3l_OS_Tight/sel/evt").unwrap();

        let config = ConfigurationLoader::default().from_yaml(file.path()).unwrap().into_generic();
        assert_eq!(config.get_typed::<String>("era").unwrap(), "2018");
        assert_eq!(config.get_typed::<String>("category").unwrap(), "hh_3l_OS_Tight/sel/evt");
    }

    #[test]
    fn json_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "era": "2016", "histograms": {{ "process": "data_obs" }} }}"#).unwrap();

        let config = ConfigurationLoader::default().from_json(file.path()).unwrap().into_generic();
        assert_eq!(config.get_typed::<String>("era").unwrap(), "2016");
        assert_eq!(config.get_typed::<String>("histograms.process").unwrap(), "data_obs");
    }

    #[test]
    fn missing_yaml_file_is_error_unless_optional() {
        assert!(ConfigurationLoader::default()
            .from_yaml("/nonexistent/analysis.yaml")
            .is_err());

        let config = ConfigurationLoader::default()
            .try_from_yaml("/nonexistent/analysis.yaml")
            .into_generic();
        assert!(config.try_get_typed::<String>("era").unwrap().is_none());
    }

    #[test]
    fn environment_source_and_help_text() {
        std::env::set_var("HISTCFGTEST_PROCESS", "TTZ");

        let config = ConfigurationLoader::default()
            .from_environment("histcfgtest")
            .unwrap()
            .into_generic();
        assert_eq!(config.get_typed::<String>("process").unwrap(), "TTZ");

        match config.get_typed::<String>("era") {
            Err(ConfigurationError::MissingField { help_text, .. }) => {
                assert!(help_text.contains("HISTCFGTEST_ERA"));
            }
            other => panic!("expected missing field error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_environment_prefix_rejected() {
        assert!(matches!(
            ConfigurationLoader::default().from_environment(""),
            Err(ConfigurationError::EmptyPrefix)
        ));
    }

    #[test]
    fn into_typed_extracts_struct() {
        #[derive(Deserialize)]
        struct Settings {
            era: String,
            #[serde(default)]
            central_or_shift: Option<String>,
        }

        let settings: Settings = ConfigurationLoader::default()
            .with_values(json!({ "era": "2016" }))
            .into_typed()
            .unwrap();
        assert_eq!(settings.era, "2016");
        assert!(settings.central_or_shift.is_none());
    }
}
