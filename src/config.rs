// src/config.rs
//
// =============================================================================
// CNCMARKET: CONFIGURATION & SESSION (v 0.3 )
// =============================================================================
//
// Layering (last wins):
// 1. Built-in defaults.
// 2. YAML file (`--config`).
// 3. Environment (CNCMARKET_API_URL, CNCMARKET_PAGE_SIZE).
// 4. CLI flags (applied by main.rs).
//
// The session (logged-in user + token) is kept as JSON in `session_file`,
// by default under the user's config directory, readable by the owner only.

use crate::core::AuthUser;
use crate::loader::MAX_PAGE_SIZE;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ENV_API_URL: &str = "CNCMARKET_API_URL";
pub const ENV_PAGE_SIZE: &str = "CNCMARKET_PAGE_SIZE";

/// Fallback in the working directory when no home directory is known.
pub const DEFAULT_SESSION_FILE: &str = ".cncmarket-session.json";
const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub page_size: usize,
    pub timeout_secs: u64,
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".into(),
            page_size: 24,
            timeout_secs: 30,
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Defaults, then the optional YAML file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// `lookup` is injected so tests don't touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(size) = lookup(ENV_PAGE_SIZE) {
            self.page_size = size
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got '{}'", ENV_PAGE_SIZE, size))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(anyhow!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                self.page_size
            ));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow!("api_url must be an http(s) URL, got '{}'", self.api_url));
        }
        Ok(())
    }

    pub fn session_path(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| default_session_path(|key| std::env::var_os(key)))
    }
}

/// `$XDG_CONFIG_HOME/cncmarket/session.json`, then `~/.config/...`, then
/// `%APPDATA%\cncmarket\...`; the working directory as a last resort.
pub fn default_session_path(lookup: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    let base = lookup("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|dir| dir.is_absolute())
        .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".config")))
        .or_else(|| lookup("APPDATA").map(PathBuf::from));

    match base {
        Some(dir) => dir.join("cncmarket").join(SESSION_FILE_NAME),
        None => PathBuf::from(DEFAULT_SESSION_FILE),
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session;

impl Session {
    pub fn load(path: &Path) -> Result<Option<AuthUser>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}", path.display()))?;
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                log::warn!("Ignoring corrupt session {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Writes the session with owner-only permissions on Unix; it holds the
    /// bearer token.
    pub fn save(path: &Path, user: &AuthUser) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let raw = serde_json::to_string_pretty(user)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(path)
            .with_context(|| format!("Failed to write session {}", path.display()))?;

        // `mode` only applies on creation; tighten a file left by older versions.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", path.display()))?;
        }

        file.write_all(raw.as_bytes())
            .with_context(|| format!("Failed to write session {}", path.display()))
    }

    pub fn clear(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove session {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{UserId, UserRole};

    #[test]
    fn yaml_overrides_defaults_partially() {
        let config = ClientConfig::from_yaml("api_url: https://market.example/api\npage_size: 50\n").unwrap();
        assert_eq!(config.api_url, "https://market.example/api");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn env_wins_over_file() {
        let mut config = ClientConfig::default();
        config
            .apply_env(|key| match key {
                ENV_PAGE_SIZE => Some("12".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.page_size, 12);
        assert_eq!(config.api_url, ClientConfig::default().api_url);

        let bad = config.apply_env(|key| (key == ENV_PAGE_SIZE).then(|| "lots".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn validation_rejects_zero_page_size_and_bad_url() {
        let mut config = ClientConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.page_size = MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());
        config.page_size = MAX_PAGE_SIZE;
        assert!(config.validate().is_ok());
        config.api_url = "localhost:8080".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn session_defaults_to_user_config_dir() {
        let lookup = |vars: &'static [(&'static str, &'static str)]| {
            move |key: &str| {
                vars.iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| OsString::from(v))
            }
        };

        assert_eq!(
            default_session_path(lookup(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/ana")])),
            PathBuf::from("/xdg/cncmarket/session.json")
        );
        // Relative XDG paths are ignored.
        assert_eq!(
            default_session_path(lookup(&[("XDG_CONFIG_HOME", "cfg"), ("HOME", "/home/ana")])),
            PathBuf::from("/home/ana/.config/cncmarket/session.json")
        );
        assert_eq!(default_session_path(lookup(&[])), PathBuf::from(DEFAULT_SESSION_FILE));

        let explicit = ClientConfig {
            session_file: Some(PathBuf::from("/tmp/s.json")),
            ..Default::default()
        };
        assert_eq!(explicit.session_path(), PathBuf::from("/tmp/s.json"));
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let user = AuthUser {
            user_id: UserId(1),
            username: "admin".into(),
            role: UserRole::Admin,
            token: "secret".into(),
        };

        // A pre-existing world-readable file gets tightened too.
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        Session::save(&path, &user).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(Session::load(&path).unwrap().unwrap().token, "secret");
    }

    #[test]
    fn session_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert!(Session::load(&path).unwrap().is_none());

        let user = AuthUser {
            user_id: UserId(4),
            username: "dealer1".into(),
            role: UserRole::Dealer,
            token: "abc".into(),
        };
        Session::save(&path, &user).unwrap();
        let loaded = Session::load(&path).unwrap().unwrap();
        assert_eq!(loaded.username, "dealer1");
        assert!(loaded.can_author());
        assert!(!loaded.is_admin());

        Session::clear(&path).unwrap();
        assert!(!path.exists());
    }
}
