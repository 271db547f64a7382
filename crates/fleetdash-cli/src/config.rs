// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use fleetdash_app::{DASHBOARD_PATH, Features, Platform, Role, TeamId, TeamRole, Tier, ViewerContext};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const APP_NAME: &str = "fleetdash";
const DEFAULT_BASE_URL: &str = "https://localhost:8080";
const DEFAULT_TIMEOUT: &str = "10s";
const TOKEN_ENV: &str = "FLEETDASH_API_TOKEN";
const CONFIG_PATH_ENV: &str = "FLEETDASH_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub viewer: Viewer,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            viewer: Viewer::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            token: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Viewer {
    pub tier: Option<String>,
    pub global_role: Option<String>,
    #[serde(default)]
    pub team_roles: Vec<TeamRoleEntry>,
    pub sandbox_mode: Option<bool>,
    pub org_name: Option<String>,
    pub software_inventory: Option<bool>,
}

impl Default for Viewer {
    fn default() -> Self {
        Self {
            tier: Some("free".to_owned()),
            global_role: Some("admin".to_owned()),
            team_roles: Vec::new(),
            sandbox_mode: Some(false),
            org_name: None,
            software_inventory: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRoleEntry {
    pub team_id: i64,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub start_path: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            start_path: Some(DASHBOARD_PATH.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub path: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [server], [viewer], [ui] and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(timeout) = &self.server.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "server.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(start_path) = &self.ui.start_path
            && !start_path.starts_with(DASHBOARD_PATH)
        {
            bail!(
                "ui.start_path in {} must be a dashboard route such as {}, got {:?}",
                path.display(),
                Platform::Darwin.path(),
                start_path
            );
        }

        self.viewer_context()
            .with_context(|| format!("invalid [viewer] section in {}", path.display()))?;
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// `FLEETDASH_API_TOKEN` wins over the file so tokens can stay out of it.
    pub fn token(&self) -> Option<String> {
        env::var(TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| self.server.token.clone())
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn start_path(&self) -> &str {
        self.ui.start_path.as_deref().unwrap_or(DASHBOARD_PATH)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log
            .path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn viewer_context(&self) -> Result<ViewerContext> {
        let viewer = &self.viewer;
        let tier = match viewer.tier.as_deref() {
            Some(raw) => Tier::parse(raw)
                .ok_or_else(|| anyhow!("viewer.tier must be free or premium, got {raw:?}"))?,
            None => Tier::Free,
        };
        let global_role = viewer
            .global_role
            .as_deref()
            .map(|raw| parse_role("viewer.global_role", raw))
            .transpose()?;
        let team_roles = viewer
            .team_roles
            .iter()
            .map(|entry| {
                Ok(TeamRole {
                    team_id: TeamId::new(entry.team_id),
                    role: parse_role("viewer.team_roles.role", &entry.role)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ViewerContext {
            tier,
            global_role,
            team_roles,
            sandbox_mode: viewer.sandbox_mode.unwrap_or(false),
            org_name: viewer.org_name.clone().unwrap_or_default(),
            org_features: Features {
                enable_software_inventory: viewer.software_inventory.unwrap_or(true),
            },
        })
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# fleetdash config\n# Place this file at: {}\n\nversion = 1\n\n[server]\nbase_url = \"{}\"\n# Prefer the {} environment variable over storing the token here.\n# token = \"\"\ntimeout = \"{}\"\n\n[viewer]\ntier = \"premium\"\nglobal_role = \"admin\"\n# team_roles = [{{ team_id = 1, role = \"maintainer\" }}]\nsandbox_mode = false\norg_name = \"\"\nsoftware_inventory = true\n\n[ui]\nstart_path = \"{}\"\n\n[log]\n# Logging is off unless a path is set; filter with FLEETDASH_LOG.\n# path = \"/tmp/fleetdash.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            TOKEN_ENV,
            DEFAULT_TIMEOUT,
            DASHBOARD_PATH,
        )
    }
}

fn parse_role(field: &str, raw: &str) -> Result<Role> {
    Role::parse(raw)
        .ok_or_else(|| anyhow!("{field} must be admin, maintainer or observer, got {raw:?}"))
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("timeout duration {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use fleetdash_app::{Role, TeamId, Tier};
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.base_url(), "https://localhost:8080");
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert_eq!(config.start_path(), "/dashboard");
        assert!(config.log_path().is_none());
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[server]\nbase_url = \"https://fleet.example.com\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[server], [viewer], [ui] and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses_into_viewer_context() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[server]\nbase_url = \"https://fleet.example.com/\"\ntimeout = \"500ms\"\n[viewer]\ntier = \"premium\"\nteam_roles = [{ team_id = 4, role = \"maintainer\" }]\nsandbox_mode = true\norg_name = \"Acme\"\nsoftware_inventory = false\n[ui]\nstart_path = \"/dashboard/mac\"\n[log]\npath = \"/tmp/fleetdash.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "https://fleet.example.com");
        assert_eq!(config.timeout()?, Duration::from_millis(500));
        assert_eq!(config.start_path(), "/dashboard/mac");
        assert_eq!(config.log_path(), Some(PathBuf::from("/tmp/fleetdash.log")));

        let context = config.viewer_context()?;
        assert_eq!(context.tier, Tier::Premium);
        assert_eq!(context.global_role, None);
        assert_eq!(context.role_on_team(TeamId::new(4)), Some(Role::Maintainer));
        assert!(context.sandbox_mode);
        assert_eq!(context.org_name, "Acme");
        assert!(!context.org_features.enable_software_inventory);
        Ok(())
    }

    #[test]
    fn default_viewer_is_a_free_tier_global_admin() -> Result<()> {
        let context = Config::default().viewer_context()?;
        assert_eq!(context.tier, Tier::Free);
        assert_eq!(context.global_role, Some(Role::Admin));
        assert!(context.org_features.enable_software_inventory);
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn unknown_role_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[viewer]\nglobal_role = \"owner\"\n")?;
        let error = Config::load(&path).expect_err("unknown role should fail");
        let message = format!("{error:#}");
        assert!(message.contains("[viewer]"));
        assert!(message.contains("viewer.global_role"));
        Ok(())
    }

    #[test]
    fn start_path_must_be_a_dashboard_route() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\nstart_path = \"/hosts/manage\"\n")?;
        let error = Config::load(&path).expect_err("non-dashboard path should fail");
        assert!(error.to_string().contains("ui.start_path"));
        Ok(())
    }

    #[test]
    fn token_env_overrides_config_value() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n[server]\ntoken = \"from-file\"\n")?;
        let config = Config::load(&path)?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("FLEETDASH_API_TOKEN", "from-env");
        }
        let token = config.token();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("FLEETDASH_API_TOKEN");
        }
        assert_eq!(token.as_deref(), Some("from-env"));
        assert_eq!(config.token().as_deref(), Some("from-file"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("FLEETDASH_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("FLEETDASH_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn timeout_rejects_invalid_and_non_positive_values() -> Result<()> {
        let error = parse_duration("10x").expect_err("unknown unit should fail");
        assert!(error.to_string().contains("invalid duration"));

        let error = parse_duration("oops").expect_err("non-numeric seconds should fail");
        assert!(error.to_string().contains("invalid timeout duration"));

        let (_temp, path) = write_config("version = 1\n[server]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn timeout_rejects_overflowing_minutes() {
        let error = parse_duration("400000000000000000m").expect_err("overflow should fail");
        assert!(error.to_string().contains("too large"));
        assert_eq!(parse_duration("2m").ok(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("[server]"));
        assert!(example.contains("[viewer]"));
        assert!(example.contains("[log]"));
        std::fs::write(&path, example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.viewer_context()?.tier, Tier::Premium);
        Ok(())
    }
}
