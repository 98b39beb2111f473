//! The `boxctl.yaml` configuration file.
//!
//! # Example YAML
//!
//! ```yaml
//! debug: false
//! address: /run/containerd/containerd.sock
//! namespace: default
//! snapshotter: overlayfs
//! cgroup_manager: systemd
//! data_root: /var/lib/boxctl
//! cni_path: /opt/cni/bin
//! cni_netconfpath: /etc/cni/net.d
//! insecure_registry: false
//! ```
//!
//! Every key is optional; a missing key takes its default.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BOXCTL_CONFIG";

/// Config file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/boxctl/boxctl.yaml";

/// Defaults for every global flag.
///
/// # Examples
///
/// ```
/// use boxctl_config::Config;
///
/// let config: Config = serde_yaml::from_str("namespace: k8s.io\n").unwrap();
/// assert_eq!(config.namespace, "k8s.io");
/// assert_eq!(config.snapshotter, "overlayfs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debug: bool,
    /// Trace-level logging; implies `debug`.
    pub debug_full: bool,
    /// containerd socket address.
    pub address: String,
    pub namespace: String,
    pub snapshotter: String,
    pub cgroup_manager: String,
    /// Root directory of the persistent state (`state.db`, volume data).
    pub data_root: PathBuf,
    pub cni_path: PathBuf,
    pub cni_netconfpath: PathBuf,
    /// Allow plain HTTP registries.
    pub insecure_registry: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            debug_full: false,
            address: "/run/containerd/containerd.sock".to_string(),
            namespace: "default".to_string(),
            snapshotter: "overlayfs".to_string(),
            cgroup_manager: "cgroupfs".to_string(),
            data_root: PathBuf::from("/var/lib/boxctl"),
            cni_path: PathBuf::from("/opt/cni/bin"),
            cni_netconfpath: PathBuf::from("/etc/cni/net.d"),
            insecure_registry: false,
        }
    }
}

impl Config {
    /// Path of the config file: `$BOXCTL_CONFIG`, or
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be
    /// read, [`YamlError`](ConfigError::YamlError) if parsing fails, or
    /// [`InvalidValue`](ConfigError::InvalidValue) for an empty namespace.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader).map_err(|source| ConfigError::YamlError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Any failure other than the file not existing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::IoError(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.as_ref().display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be
    /// written, or [`YamlError`](ConfigError::YamlError) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self).map_err(|source| ConfigError::YamlError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "namespace",
                reason: "must not be empty".to_string(),
            });
        }
        if self.data_root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "data_root",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
debug: true
address: unix:///run/k3s/containerd/containerd.sock
namespace: k8s.io
snapshotter: native
cgroup_manager: systemd
data_root: /tmp/boxctl
insecure_registry: true
"#
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_yaml::from_str(sample_yaml()).unwrap();
        assert!(config.debug);
        assert!(!config.debug_full);
        assert_eq!(config.address, "unix:///run/k3s/containerd/containerd.sock");
        assert_eq!(config.namespace, "k8s.io");
        assert_eq!(config.snapshotter, "native");
        assert_eq!(config.cgroup_manager, "systemd");
        assert_eq!(config.data_root, PathBuf::from("/tmp/boxctl"));
        assert!(config.insecure_registry);
        // Keys not present keep their defaults.
        assert_eq!(config.cni_path, PathBuf::from("/opt/cni/bin"));
        assert_eq!(config.cni_netconfpath, PathBuf::from("/etc/cni/net.d"));
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.cgroup_manager, "cgroupfs");
        assert_eq!(config.address, "/run/containerd/containerd.sock");
        assert_eq!(config.data_root, PathBuf::from("/var/lib/boxctl"));
    }

    #[test]
    fn test_load_rejects_empty_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxctl.yaml");
        std::fs::write(&path, "namespace: \"\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "namespace", .. }));
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxctl.yaml");

        let original: Config = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
