//! Layered configuration loading.
//!
//! Sources are merged in increasing precedence:
//! 1. built-in defaults
//! 2. the user-wide file in the platform config directory
//!    (`~/.config/strata/config.toml` on Linux)
//! 3. the first project file of the working directory: `strata.<ext>`, then
//!    `.strata/config.<ext>`
//! 4. the file named by `STRATA_CONFIG`
//! 5. `STRATA_*` environment variables, nested with `__`
//!
//! Every layer is optional. Files are read lazily; parse and validation
//! errors surface from [`ConfigLoader::extract`].

use super::{
    CONFIG_PATH_ENV, ConfigError, ENV_PREFIX, PROJECT_CONFIG_STEMS, Result, models::*, validation,
};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supported file formats, picked by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Extensions tried during discovery, in order
    pub const EXTENSIONS: [&'static str; 4] = ["toml", "yaml", "yml", "json"];

    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// First existing `<stem>.<ext>` under `dir`
fn first_existing(dir: &Path, stem: &str) -> Option<PathBuf> {
    ConfigFormat::EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

/// Builds a [`StrataConfig`] from defaults, files and the environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    figment: Figment,
    loaded: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Start from the built-in defaults
    pub fn new() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(StrataConfig::default())),
            loaded: Vec::new(),
        }
    }

    /// Defaults, every discoverable file and the environment, validated
    pub fn discover() -> Result<StrataConfig> {
        let mut loader = Self::new();
        loader.load_default_files()?.load_env();
        loader.extract()
    }

    /// Layer a single file on top of what is loaded so far
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileLoadError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let Some(format) = ConfigFormat::from_path(path) else {
            return Err(ConfigError::FileLoadError(format!(
                "Unsupported file format: {}",
                path.display()
            )));
        };

        let figment = std::mem::take(&mut self.figment);
        self.figment = match format {
            ConfigFormat::Toml => figment.merge(Toml::file(path)),
            ConfigFormat::Yaml => figment.merge(Yaml::file(path)),
            ConfigFormat::Json => figment.merge(Json::file(path)),
        };
        self.loaded.push(path.to_path_buf());
        debug!(path = %path.display(), "Layered configuration file");
        Ok(self)
    }

    /// The user-wide configuration file, if one exists
    pub fn user_config_file() -> Option<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "strata")?;
        first_existing(dirs.config_dir(), "config")
    }

    /// The project configuration file of `dir`, if one exists
    pub fn project_config_file(dir: &Path) -> Option<PathBuf> {
        PROJECT_CONFIG_STEMS
            .iter()
            .find_map(|stem| first_existing(dir, stem))
    }

    /// Layer the user-wide file, then the project file of `dir`
    pub fn load_files_from(&mut self, dir: &Path) -> Result<&mut Self> {
        for path in Self::user_config_file()
            .into_iter()
            .chain(Self::project_config_file(dir))
        {
            self.load_file(path)?;
        }
        Ok(self)
    }

    /// Layer the user-wide file, the project file of the working directory and
    /// the file named by `STRATA_CONFIG`.
    ///
    /// A `STRATA_CONFIG` pointing at a missing file is an error.
    pub fn load_default_files(&mut self) -> Result<&mut Self> {
        match std::env::current_dir() {
            Ok(dir) => {
                self.load_files_from(&dir)?;
            }
            Err(e) => debug!(error = %e, "No working directory, skipping project configuration"),
        }
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            self.load_file(PathBuf::from(path))?;
        }
        Ok(self)
    }

    /// Layer `STRATA_*` environment variables.
    ///
    /// Nested keys use a double underscore: `STRATA_SEARCH__BM25__K1=1.5`.
    pub fn load_env(&mut self) -> &mut Self {
        let env = Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__");
        self.figment = std::mem::take(&mut self.figment).merge(env);
        self
    }

    /// Layer any other figment provider
    pub fn merge<T: figment::Provider>(&mut self, provider: T) -> &mut Self {
        self.figment = std::mem::take(&mut self.figment).merge(provider);
        self
    }

    /// Files layered so far, lowest precedence first
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded
    }

    /// Extract and validate the merged configuration
    pub fn extract(&self) -> Result<StrataConfig> {
        let config: StrataConfig = self
            .figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        validation::validate_config(&config)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
