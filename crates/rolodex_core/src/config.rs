//! Configuration loading.
//!
//! # Responsibility
//! - Locate and parse the TOML config file.
//! - Fall back to the legacy `denote-contacts` config and then to defaults.
//!
//! # Invariants
//! - A missing config file is never an error; a malformed one always is.
//! - `~` prefixes are expanded against the home directory.

use crate::linkage::IdentifierScheme;
use log::debug;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

/// Overrides the contacts directory unless `--dir` is given.
pub const DIR_ENV_VAR: &str = "ROLODEX_DIR";

const CONFIG_DIR_NAME: &str = "rolodex";
const LEGACY_CONFIG_DIR_NAME: &str = "denote-contacts";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    /// No home directory to resolve defaults against.
    NoHomeDirectory,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::NoHomeDirectory => write!(f, "home directory could not be determined"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::NoHomeDirectory => None,
        }
    }
}

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub contacts_directory: PathBuf,
    pub identifier_scheme: IdentifierScheme,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    /// File the settings came from; `None` for built-in defaults.
    pub source: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    contacts_directory: Option<String>,
    #[serde(default)]
    identifier_scheme: IdentifierScheme,
    log_level: Option<String>,
    log_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyConfigFile {
    contacts_directory: Option<String>,
    notes_directory: Option<String>,
}

impl Config {
    /// Loads settings, trying `explicit` first, then the user config files.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Self::load_with_home(explicit, &home)
    }

    /// Same as [`Config::load`] with an explicit home directory.
    pub fn load_with_home(explicit: Option<&Path>, home: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path, home);
        }

        let current = home
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILENAME);
        if current.is_file() {
            return Self::load_file(&current, home);
        }

        let legacy = home
            .join(".config")
            .join(LEGACY_CONFIG_DIR_NAME)
            .join(CONFIG_FILENAME);
        if legacy.is_file() {
            return Self::load_legacy_file(&legacy, home);
        }

        debug!("event=config_load module=config status=default");
        Ok(Self::defaults(home))
    }

    /// Built-in settings used when no config file exists.
    pub fn defaults(home: &Path) -> Self {
        Self {
            contacts_directory: default_contacts_directory(home),
            identifier_scheme: IdentifierScheme::default(),
            log_level: None,
            log_dir: None,
            source: None,
        }
    }

    /// Applies `--dir` or the environment override, in that order.
    pub fn with_directory_override(mut self, cli_dir: Option<PathBuf>) -> Self {
        let env_dir = std::env::var_os(DIR_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        if let Some(dir) = cli_dir.or(env_dir) {
            self.contacts_directory = dir;
        }
        self
    }

    fn load_file(path: &Path, home: &Path) -> Result<Self, ConfigError> {
        let raw = read_config(path)?;
        let parsed: ConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(
            "event=config_load module=config status=ok path={}",
            path.display()
        );
        Ok(Self {
            contacts_directory: parsed
                .contacts_directory
                .filter(|dir| !dir.trim().is_empty())
                .map(|dir| expand_tilde(&dir, home))
                .unwrap_or_else(|| default_contacts_directory(home)),
            identifier_scheme: parsed.identifier_scheme,
            log_level: parsed.log_level.filter(|level| !level.trim().is_empty()),
            log_dir: parsed
                .log_dir
                .filter(|dir| !dir.trim().is_empty())
                .map(|dir| expand_tilde(&dir, home)),
            source: Some(path.to_path_buf()),
        })
    }

    fn load_legacy_file(path: &Path, home: &Path) -> Result<Self, ConfigError> {
        let raw = read_config(path)?;
        let parsed: LegacyConfigFile =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let directory = parsed
            .contacts_directory
            .filter(|dir| !dir.trim().is_empty())
            .or(parsed.notes_directory)
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| expand_tilde(&dir, home))
            .unwrap_or_else(|| default_contacts_directory(home));

        debug!(
            "event=config_load module=config status=legacy path={}",
            path.display()
        );
        Ok(Self {
            contacts_directory: directory,
            source: Some(path.to_path_buf()),
            ..Self::defaults(home)
        })
    }
}

/// Expands a leading `~` against `home`.
pub fn expand_tilde(value: &str, home: &Path) -> PathBuf {
    let value = value.trim();
    match value.strip_prefix('~') {
        Some(rest) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(value),
    }
}

fn default_contacts_directory(home: &Path) -> PathBuf {
    home.join("Documents").join("denote")
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{expand_tilde, Config, ConfigError};
    use crate::linkage::IdentifierScheme;
    use std::fs;
    use std::path::Path;

    fn write_config(home: &Path, dir_name: &str, body: &str) {
        let dir = home.join(".config").join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), body).unwrap();
    }

    #[test]
    fn defaults_apply_without_any_file() {
        let home = tempfile::tempdir().unwrap();
        let config = Config::load_with_home(None, home.path()).unwrap();
        assert_eq!(
            config.contacts_directory,
            home.path().join("Documents").join("denote")
        );
        assert_eq!(config.identifier_scheme, IdentifierScheme::Timestamp);
        assert!(config.source.is_none());
    }

    #[test]
    fn current_file_wins_over_legacy() {
        let home = tempfile::tempdir().unwrap();
        write_config(
            home.path(),
            "rolodex",
            "contacts_directory = \"~/people\"\nidentifier_scheme = \"opaque\"\nlog_level = \"debug\"\n",
        );
        write_config(home.path(), "denote-contacts", "notes_directory = \"/old\"\n");

        let config = Config::load_with_home(None, home.path()).unwrap();
        assert_eq!(config.contacts_directory, home.path().join("people"));
        assert_eq!(config.identifier_scheme, IdentifierScheme::Opaque);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn legacy_file_prefers_contacts_directory_then_notes_directory() {
        let home = tempfile::tempdir().unwrap();
        write_config(home.path(), "denote-contacts", "notes_directory = \"~/notes\"\n");
        let config = Config::load_with_home(None, home.path()).unwrap();
        assert_eq!(config.contacts_directory, home.path().join("notes"));

        write_config(
            home.path(),
            "denote-contacts",
            "notes_directory = \"~/notes\"\ncontacts_directory = \"/srv/contacts\"\n",
        );
        let config = Config::load_with_home(None, home.path()).unwrap();
        assert_eq!(config.contacts_directory, Path::new("/srv/contacts"));
    }

    #[test]
    fn explicit_file_must_parse() {
        let home = tempfile::tempdir().unwrap();
        let path = home.path().join("broken.toml");
        fs::write(&path, "contacts_directory = [").unwrap();
        let err = Config::load_with_home(Some(&path), home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn tilde_expansion_only_touches_prefix() {
        let home = Path::new("/home/ada");
        assert_eq!(expand_tilde("~/x/y", home), Path::new("/home/ada/x/y"));
        assert_eq!(expand_tilde("~", home), Path::new("/home/ada"));
        assert_eq!(expand_tilde("/abs/~x", home), Path::new("/abs/~x"));
    }
}
