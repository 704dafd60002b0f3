use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    dispatcher: DispatcherConfig,
    #[serde(default)]
    interface: InterfaceConfig,
    #[serde(default)]
    layers: LayersConfig,
}

#[derive(Deserialize, Default)]
struct DispatcherConfig {
    thread_name: Option<String>,
    stall_warning_secs: Option<u64>,
    log_actions: Option<bool>,
}

#[derive(Deserialize, Default)]
struct InterfaceConfig {
    windows: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct LayersConfig {
    default_dims: Option<[usize; 3]>,
}

pub struct Config {
    dispatcher: DispatcherConfig,
    interface: InterfaceConfig,
    layers: LayersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::embedded()
    }
}

impl Config {
    /// Built-in defaults merged with the user's config file, if any.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::embedded(),
        }
    }

    /// Built-in defaults merged with the file at `path`. A missing or
    /// malformed file leaves the defaults untouched.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::embedded();
        if !path.exists() {
            return config;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => {
                    merge_dispatcher(&mut config.dispatcher, user.dispatcher);
                    merge_interface(&mut config.interface, user.interface);
                    merge_layers(&mut config.layers, user.layers);
                }
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        config
    }

    fn embedded() -> Self {
        let base: ConfigFile = match toml::from_str(DEFAULT_CONFIG) {
            Ok(base) => base,
            Err(e) => {
                log::error!(target: "config", "embedded config.toml is malformed: {}", e);
                ConfigFile::default()
            }
        };
        Config {
            dispatcher: base.dispatcher,
            interface: base.interface,
            layers: base.layers,
        }
    }

    /// Name given to the dispatcher's owning thread.
    pub fn dispatcher_thread_name(&self) -> String {
        self.dispatcher
            .thread_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "lamina-actions".to_string())
    }

    /// How long an action may sit on a locked resource before a warning is
    /// logged. Zero disables the warning.
    pub fn stall_warning(&self) -> Option<Duration> {
        match self.dispatcher.stall_warning_secs.unwrap_or(10) {
            0 => None,
            secs => Some(Duration::from_secs(secs.min(86_400))),
        }
    }

    pub fn log_actions(&self) -> bool {
        self.dispatcher.log_actions.unwrap_or(true)
    }

    /// Window ids registered with the interface manager at startup.
    pub fn windows(&self) -> Vec<String> {
        self.interface.windows.clone().unwrap_or_default()
    }

    /// Dimensions of a layer created without explicit dims (each clamped to 1..=4096).
    pub fn default_layer_dims(&self) -> [usize; 3] {
        self.layers
            .default_dims
            .unwrap_or([64, 64, 64])
            .map(|d| d.clamp(1, 4096))
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lamina").join("config.toml"))
}

fn merge_dispatcher(base: &mut DispatcherConfig, user: DispatcherConfig) {
    if user.thread_name.is_some() {
        base.thread_name = user.thread_name;
    }
    if user.stall_warning_secs.is_some() {
        base.stall_warning_secs = user.stall_warning_secs;
    }
    if user.log_actions.is_some() {
        base.log_actions = user.log_actions;
    }
}

fn merge_interface(base: &mut InterfaceConfig, user: InterfaceConfig) {
    if user.windows.is_some() {
        base.windows = user.windows;
    }
}

fn merge_layers(base: &mut LayersConfig, user: LayersConfig) {
    if user.default_dims.is_some() {
        base.default_dims = user.default_dims;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_embedded_config() {
        let config = Config::embedded();
        assert_eq!(config.dispatcher_thread_name(), "lamina-actions");
        assert_eq!(config.stall_warning(), Some(Duration::from_secs(10)));
        assert!(config.log_actions());
        assert!(config.windows().iter().any(|w| w == "viewer"));
        assert!(config.windows().iter().any(|w| w == "layermanager"));
        assert_eq!(config.default_layer_dims(), [64, 64, 64]);
    }

    #[test]
    fn test_user_config_overrides_some_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[dispatcher]\nstall_warning_secs = 0\n\n[layers]\ndefault_dims = [8, 0, 9000]").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.stall_warning(), None);
        assert_eq!(config.default_layer_dims(), [8, 1, 4096]);
        // Untouched keys keep their built-in values
        assert_eq!(config.dispatcher_thread_name(), "lamina-actions");
        assert!(!config.windows().is_empty());
    }

    #[test]
    fn test_malformed_user_config_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dispatcher\nthread_name = ").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.dispatcher_thread_name(), "lamina-actions");
    }

    #[test]
    fn test_missing_user_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml"));
        assert!(config.log_actions());
    }
}
