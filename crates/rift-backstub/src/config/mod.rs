//! Configuration file for the backstub server.
//!
//! ```yaml
//! listen:
//!   port: 3333
//! mounts:
//!   - dir: ./stubs/hello
//!   - dir: ./stubs/merge
//!     service: https://api.github.com
//! proxies:
//!   - path: "*"
//!     service: https://api.github.com
//! client:
//!   request_timeout_secs: 10
//! ```

mod client;
mod listen;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use client::ClientConfig;
pub use listen::ListenConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    /// Stub directories, mounted in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<MountConfig>,
    /// Pass-through routes, registered after all mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<ProxyConfig>,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MountConfig {
    pub dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyConfig {
    pub path: String,
    pub service: String,
}

impl MountConfig {
    /// Parse the CLI form `<dir>[,<service>]`.
    pub fn parse_cli(value: &str) -> Self {
        let (dir, service) = match value.split_once(',') {
            Some((dir, service)) if !service.is_empty() => (dir, Some(service.to_string())),
            Some((dir, _)) => (dir, None),
            None => (value, None),
        };
        Self {
            dir: PathBuf::from(dir),
            service,
        }
    }
}

impl ProxyConfig {
    /// Parse the CLI form `<endpoint>,<service>`.
    pub fn parse_cli(value: &str) -> Result<Self, anyhow::Error> {
        match value.split_once(',') {
            Some((path, service)) if !path.is_empty() && !service.is_empty() => Ok(Self {
                path: path.to_string(),
                service: service.to_string(),
            }),
            _ => anyhow::bail!("proxy must be given as <endpoint>,<service>, got '{value}'"),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for mount in &self.mounts {
            if mount.dir.as_os_str().is_empty() {
                anyhow::bail!("mount entry has an empty 'dir'");
            }
            if mount.dir.as_os_str() == "*" && mount.service.is_none() {
                anyhow::bail!("mount '*' requires a 'service' to proxy to");
            }
        }

        for proxy in &self.proxies {
            if proxy.path.is_empty() {
                anyhow::bail!("proxy entry has an empty 'path'");
            }
            if proxy.service.is_empty() {
                anyhow::bail!("proxy '{}' has an empty 'service'", proxy.path);
            }
        }

        if self.client.request_timeout_secs == 0 {
            anyhow::bail!("client.request_timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Check that every mount directory exists and is a directory.
    pub fn check_mount_dirs(&self) -> Result<(), anyhow::Error> {
        for mount in &self.mounts {
            if mount.dir.as_os_str() == "*" {
                continue;
            }
            match std::fs::metadata(&mount.dir) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => anyhow::bail!("{} is not a directory", mount.dir.display()),
                Err(_) => anyhow::bail!("{} does not exist", mount.dir.display()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen.port, 3333);
        assert_eq!(config.listen.host, "0.0.0.0");
        assert_eq!(config.listen.backlog, 511);
        assert_eq!(config.client.request_timeout_secs, 30);
        assert!(!config.client.tls_skip_verify);
        assert!(config.mounts.is_empty());
    }

    #[test]
    fn test_config_full_yaml() {
        let yaml = r#"
listen:
  port: 4000
  host: 127.0.0.1
mounts:
  - dir: ./stubs
  - dir: ./merge
    service: https://api.github.com
proxies:
  - path: "*"
    service: https://api.github.com
client:
  connect_timeout_secs: 2
  tls_skip_verify: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.listen.port, 4000);
        assert_eq!(config.listen.backlog, 511);
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(
            config.mounts[1].service.as_deref(),
            Some("https://api.github.com")
        );
        assert_eq!(config.proxies[0].path, "*");
        assert_eq!(config.client.connect_timeout_secs, 2);
        assert_eq!(config.client.request_timeout_secs, 30);
        assert!(config.client.tls_skip_verify);
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let config: Config = serde_yaml::from_str("mounts: [{dir: '*'}]").unwrap();
        assert!(config.validate().is_err());

        let config: Config =
            serde_yaml::from_str("proxies: [{path: '', service: 'http://x'}]").unwrap();
        assert!(config.validate().is_err());

        let config: Config = serde_yaml::from_str("client: {request_timeout_secs: 0}").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_cli_values() {
        let mount = MountConfig::parse_cli("./stubs,http://localhost:8080");
        assert_eq!(mount.dir, PathBuf::from("./stubs"));
        assert_eq!(mount.service.as_deref(), Some("http://localhost:8080"));

        let plain = MountConfig::parse_cli("./stubs");
        assert!(plain.service.is_none());

        let proxy = ProxyConfig::parse_cli("*,https://api.github.com").unwrap();
        assert_eq!(proxy.path, "*");
        assert_eq!(proxy.service, "https://api.github.com");
        assert!(ProxyConfig::parse_cli("*").is_err());
    }

    #[test]
    fn test_check_mount_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.json");
        std::fs::write(&file, "{}").unwrap();

        let ok = Config {
            mounts: vec![MountConfig {
                dir: dir.path().to_path_buf(),
                service: None,
            }],
            ..Default::default()
        };
        ok.check_mount_dirs().unwrap();

        let not_dir = Config {
            mounts: vec![MountConfig {
                dir: file,
                service: None,
            }],
            ..Default::default()
        };
        let err = not_dir.check_mount_dirs().unwrap_err();
        assert!(err.to_string().contains("is not a directory"));

        let missing = Config {
            mounts: vec![MountConfig {
                dir: dir.path().join("nope"),
                service: None,
            }],
            ..Default::default()
        };
        let err = missing.check_mount_dirs().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
