use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory searched by [`load_config`], relative to the working directory.
const DEFAULT_DIRECTORY: &str = "configuration";

/// File extensions tried for every layer, in order.
const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Environment variables overriding file values start with `APP_`.
const OVERRIDE_PREFIX: &str = "APP";

/// Joins the segments of a nested key in an override variable, as in `APP_SOURCE__HOST`.
const OVERRIDE_NESTING: &str = "__";

/// Configuration loadable with [`load_config`] and [`load_config_from`].
pub trait Config {
    /// Keys whose override variables hold comma-separated lists.
    const LIST_KEYS: &'static [&'static str];
}

/// A configuration file merged into the result. Later layers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    Base,
    Environment(Environment),
}

impl ConfigLayer {
    fn file_stem(self) -> &'static str {
        match self {
            ConfigLayer::Base => "base",
            ConfigLayer::Environment(environment) => environment.as_str(),
        }
    }
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLayer::Base => f.write_str("base configuration"),
            ConfigLayer::Environment(environment) => {
                write!(f, "`{environment}` configuration")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("cannot resolve the working directory: {0}")]
    NoWorkingDirectory(#[source] io::Error),

    #[error("configuration directory `{}` not found", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("{layer} not found in `{}` (looked for {})", .directory.display(), file_list(.candidates))]
    FileNotFound {
        layer: ConfigLayer,
        directory: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("{layer} in `{}` is invalid: {source}", .path.display())]
    InvalidFile {
        layer: ConfigLayer,
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("invalid `APP_ENVIRONMENT`: {0}")]
    UnknownEnvironment(#[source] io::Error),

    #[error("cannot merge configuration layers: {0}")]
    Merge(#[source] config::ConfigError),

    #[error("configuration does not match the expected shape: {0}")]
    Invalid(#[source] config::ConfigError),
}

fn file_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Loads configuration from `./configuration`.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let working_directory = std::env::current_dir().map_err(LoadConfigError::NoWorkingDirectory)?;

    load_config_from(&working_directory.join(DEFAULT_DIRECTORY))
}

/// Loads configuration from `directory`.
///
/// `base.*` is read first, then the file named after the environment selected by
/// `APP_ENVIRONMENT` (`dev.*` or `prod.*`), then `APP_` prefixed variables. Each file may be
/// YAML or JSON.
pub fn load_config_from<T>(directory: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::DirectoryNotFound(directory.to_path_buf()));
    }

    let environment = Environment::load().map_err(LoadConfigError::UnknownEnvironment)?;

    let mut builder = config::Config::builder();
    for layer in [ConfigLayer::Base, ConfigLayer::Environment(environment)] {
        builder = builder.add_source(read_layer(directory, layer)?);
    }

    builder
        .add_source(overrides(T::LIST_KEYS))
        .build()
        .map_err(LoadConfigError::Merge)?
        .try_deserialize()
        .map_err(LoadConfigError::Invalid)
}

/// Parses the file of `layer` on its own, so a syntax error names the file it is in.
fn read_layer(directory: &Path, layer: ConfigLayer) -> Result<config::Config, LoadConfigError> {
    let candidates = EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", layer.file_stem())))
        .collect::<Vec<_>>();

    let Some(path) = candidates.iter().find(|path| path.is_file()).cloned() else {
        return Err(LoadConfigError::FileNotFound {
            layer,
            directory: directory.to_path_buf(),
            candidates,
        });
    };

    config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .build()
        .map_err(|source| LoadConfigError::InvalidFile {
            layer,
            path,
            source,
        })
}

fn overrides(list_keys: &[&str]) -> config::Environment {
    let mut overrides = config::Environment::with_prefix(OVERRIDE_PREFIX)
        .prefix_separator("_")
        .separator(OVERRIDE_NESTING);

    if !list_keys.is_empty() {
        overrides = overrides.try_parsing(true).list_separator(",");
        for key in list_keys {
            overrides = overrides.with_list_parse_key(key);
        }
    }

    overrides
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Sample {
        chunk_size: usize,
        table: String,
    }

    impl Config for Sample {
        const LIST_KEYS: &'static [&'static str] = &[];
    }

    /// Creates an empty directory unique to `test`.
    fn scratch_directory(test: &str) -> PathBuf {
        let directory = std::env::temp_dir().join(format!(
            "etl-config-{test}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&directory);
        fs::create_dir_all(&directory).unwrap();

        directory
    }

    fn environment_stem() -> &'static str {
        Environment::load().unwrap().as_str()
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = load_config_from::<Sample>(Path::new("/definitely/not/a/config/dir")).unwrap_err();

        assert!(matches!(err, LoadConfigError::DirectoryNotFound(_)));
    }

    #[test]
    fn missing_base_file_lists_every_candidate() {
        let directory = scratch_directory("missing-base");

        let err = load_config_from::<Sample>(&directory).unwrap_err();

        match err {
            LoadConfigError::FileNotFound {
                layer, candidates, ..
            } => {
                assert_eq!(layer, ConfigLayer::Base);
                assert_eq!(candidates.len(), EXTENSIONS.len());
                assert!(candidates[0].ends_with("base.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }

        fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn environment_file_overrides_base() {
        let directory = scratch_directory("layering");
        fs::write(
            directory.join("base.yaml"),
            "chunk_size: 100\ntable: public.products\n",
        )
        .unwrap();
        fs::write(
            directory.join(format!("{}.json", environment_stem())),
            r#"{ "chunk_size": 500 }"#,
        )
        .unwrap();

        let sample = load_config_from::<Sample>(&directory).unwrap();

        assert_eq!(sample.chunk_size, 500);
        assert_eq!(sample.table, "public.products");

        fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn malformed_file_names_its_layer() {
        let directory = scratch_directory("malformed");
        fs::write(directory.join("base.yaml"), "chunk_size: 100\n").unwrap();
        fs::write(
            directory.join(format!("{}.yaml", environment_stem())),
            "chunk_size: [unclosed\n",
        )
        .unwrap();

        let err = load_config_from::<Sample>(&directory).unwrap_err();

        match err {
            LoadConfigError::InvalidFile { layer, path, .. } => {
                assert!(matches!(layer, ConfigLayer::Environment(_)));
                assert_eq!(path, directory.join(format!("{}.yaml", environment_stem())));
            }
            other => panic!("unexpected error: {other}"),
        }

        fs::remove_dir_all(directory).unwrap();
    }
}
