use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Agent configuration.
///
/// The cache name carries the version tag: bumping it is the only mechanism
/// for invalidating everything previously stored, on the next activation.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
  /// Origin the agent controls; requests elsewhere are passed through
  pub scope: Url,
  /// Versioned cache bucket name
  #[serde(default = "default_cache_name")]
  pub cache_name: String,
  /// Root-relative paths warmed into the cache at install
  #[serde(default = "default_precache")]
  pub precache: Vec<String>,
  /// Document served for failed HTML navigations while offline
  #[serde(default = "default_offline_shell")]
  pub offline_shell: String,
  /// URL substrings that mark third-party traffic the agent must not touch
  #[serde(default = "default_bypass_markers")]
  pub bypass_markers: Vec<String>,
  #[serde(default)]
  pub notifications: NotificationConfig,
}

/// Defaults applied to notifications built from push payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
  #[serde(default = "default_title")]
  pub default_title: String,
  #[serde(default = "default_body")]
  pub default_body: String,
  #[serde(default = "default_target")]
  pub default_url: String,
  #[serde(default = "default_icon")]
  pub icon: String,
  #[serde(default = "default_icon")]
  pub badge: String,
  #[serde(default = "default_vibration")]
  pub vibration: Vec<u32>,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      default_title: default_title(),
      default_body: default_body(),
      default_url: default_target(),
      icon: default_icon(),
      badge: default_icon(),
      vibration: default_vibration(),
    }
  }
}

fn default_cache_name() -> String {
  "medquiz-v1.0".to_string()
}

fn default_precache() -> Vec<String> {
  vec![
    "./".to_string(),
    "./index.html".to_string(),
    "./manifest.json".to_string(),
  ]
}

fn default_offline_shell() -> String {
  "./index.html".to_string()
}

fn default_bypass_markers() -> Vec<String> {
  vec!["telegram".to_string()]
}

fn default_title() -> String {
  "MedQuiz".to_string()
}

fn default_body() -> String {
  "Новое уведомление от MedQuiz".to_string()
}

fn default_target() -> String {
  "./".to_string()
}

fn default_icon() -> String {
  "icon-192.png".to_string()
}

fn default_vibration() -> Vec<u32> {
  vec![100, 50, 100]
}

impl AgentConfig {
  /// Configuration with defaults for the given scope.
  pub fn new(scope: Url) -> Self {
    Self {
      scope,
      cache_name: default_cache_name(),
      precache: default_precache(),
      offline_shell: default_offline_shell(),
      bypass_markers: default_bypass_markers(),
      notifications: NotificationConfig::default(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./medquiz-offline.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/medquiz-offline/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/medquiz-offline/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("medquiz-offline.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("medquiz-offline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: AgentConfig = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolve a root-relative path (or absolute URL) against the scope.
  pub fn resolve(&self, path: &str) -> Result<Url> {
    self
      .scope
      .join(path)
      .map_err(|e| eyre!("Cannot resolve '{}' against {}: {}", path, self.scope, e))
  }

  /// Absolute URL of the offline shell document.
  pub fn shell_url(&self) -> Result<Url> {
    self.resolve(&self.offline_shell)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_yaml_gets_defaults() {
    let config: AgentConfig = serde_yaml::from_str("scope: https://medquiz.example/\n").unwrap();

    assert_eq!(config.cache_name, "medquiz-v1.0");
    assert_eq!(config.precache, vec!["./", "./index.html", "./manifest.json"]);
    assert_eq!(config.offline_shell, "./index.html");
    assert_eq!(config.bypass_markers, vec!["telegram"]);
    assert_eq!(config.notifications.default_title, "MedQuiz");
    assert_eq!(config.notifications.vibration, vec![100, 50, 100]);
  }

  #[test]
  fn test_yaml_overrides_cache_name() {
    let yaml = "scope: https://medquiz.example/\ncache_name: medquiz-v2.0\n";
    let config: AgentConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.cache_name, "medquiz-v2.0");
  }

  #[test]
  fn test_resolve_relative_and_absolute() {
    let config = AgentConfig::new(Url::parse("https://medquiz.example/").unwrap());

    assert_eq!(
      config.resolve("./index.html").unwrap().as_str(),
      "https://medquiz.example/index.html"
    );
    assert_eq!(config.resolve("./").unwrap().as_str(), "https://medquiz.example/");
    assert_eq!(
      config.resolve("https://other.example/x").unwrap().as_str(),
      "https://other.example/x"
    );
  }
}
