//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{JanitorError, Result};

/// Full janitor configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub policy: PolicyConfig,
    pub paths: PathsConfig,
    pub notifications: NotificationConfig,
}

/// Retention and disk-pressure policy knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Days an image upload is retained before becoming a retention candidate.
    pub image_retention_days: u32,
    /// Days a non-image upload is retained before becoming a retention candidate.
    pub non_image_retention_days: u32,
    /// Usage fraction at/above which pressure eviction engages; also the
    /// target the pressure loop drives usage back down to.
    pub pressure_threshold: f64,
    /// Usage fraction at/above which the run is classified as an emergency.
    /// Severity labeling only — the pressure loop always targets
    /// `pressure_threshold`.
    pub emergency_threshold: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            image_retention_days: 90,
            non_image_retention_days: 30,
            pressure_threshold: 0.85,
            emergency_threshold: 0.92,
        }
    }
}

/// Filesystem paths used by cmj.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Root of the homeserver media repository (the mount the pressure loop
    /// observes and the tree media files are resolved under).
    pub media_root: PathBuf,
    /// Directory holding per-mode notification fingerprints.
    pub state_dir: PathBuf,
    pub sqlite_db: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[CMJ-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("cmj").join("config.toml");
        let data = home_dir.join(".local").join("share").join("cmj");
        Self {
            config_file: cfg,
            media_root: PathBuf::from("/srv/media"),
            state_dir: data.join("state"),
            sqlite_db: data.join("uploads.sqlite3"),
        }
    }
}

/// Notification behavior and transport destinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Master switch for all notifications.
    pub enabled: bool,
    /// Chat room to post run summaries into.
    pub room_id: String,
    /// Also send summaries for runs that deleted nothing.
    pub send_zero_deletion_summaries: bool,
    /// Optional append-only JSONL mirror of every sent notification.
    pub outbox: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            room_id: String::new(),
            send_zero_deletion_summaries: false,
            outbox: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| JanitorError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(JanitorError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        set_env_u32(
            "CMJ_POLICY_IMAGE_RETENTION_DAYS",
            &mut self.policy.image_retention_days,
        )?;
        set_env_u32(
            "CMJ_POLICY_NON_IMAGE_RETENTION_DAYS",
            &mut self.policy.non_image_retention_days,
        )?;
        set_env_f64(
            "CMJ_POLICY_PRESSURE_THRESHOLD",
            &mut self.policy.pressure_threshold,
        )?;
        set_env_f64(
            "CMJ_POLICY_EMERGENCY_THRESHOLD",
            &mut self.policy.emergency_threshold,
        )?;

        set_env_path("CMJ_PATHS_MEDIA_ROOT", &mut self.paths.media_root);
        set_env_path("CMJ_PATHS_STATE_DIR", &mut self.paths.state_dir);
        set_env_path("CMJ_PATHS_SQLITE_DB", &mut self.paths.sqlite_db);

        set_env_bool(
            "CMJ_NOTIFICATIONS_ENABLED",
            &mut self.notifications.enabled,
        )?;
        set_env_bool(
            "CMJ_NOTIFICATIONS_SEND_ZERO_DELETION_SUMMARIES",
            &mut self.notifications.send_zero_deletion_summaries,
        )?;
        if let Some(value) = env::var_os("CMJ_NOTIFICATIONS_ROOM_ID") {
            self.notifications.room_id = value.to_string_lossy().into_owned();
        }

        Ok(())
    }

    /// Validate cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        let p = &self.policy;
        if !(p.pressure_threshold > 0.0 && p.pressure_threshold <= 1.0) {
            return Err(JanitorError::InvalidConfig {
                details: format!(
                    "policy.pressure_threshold must be in (0, 1], got {}",
                    p.pressure_threshold
                ),
            });
        }
        if !(p.emergency_threshold > 0.0 && p.emergency_threshold <= 1.0) {
            return Err(JanitorError::InvalidConfig {
                details: format!(
                    "policy.emergency_threshold must be in (0, 1], got {}",
                    p.emergency_threshold
                ),
            });
        }
        if p.pressure_threshold >= p.emergency_threshold {
            return Err(JanitorError::InvalidConfig {
                details: format!(
                    "policy.pressure_threshold ({}) must be below emergency_threshold ({})",
                    p.pressure_threshold, p.emergency_threshold
                ),
            });
        }
        if p.image_retention_days == 0 || p.non_image_retention_days == 0 {
            return Err(JanitorError::InvalidConfig {
                details: "retention day counts must be at least 1".to_string(),
            });
        }
        if self.paths.media_root.as_os_str().is_empty() {
            return Err(JanitorError::InvalidConfig {
                details: "paths.media_root must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn set_env_f64(key: &str, target: &mut f64) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw.parse().map_err(|_| JanitorError::InvalidConfig {
            details: format!("{key} must be a float, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_env_u32(key: &str, target: &mut u32) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw.parse().map_err(|_| JanitorError::InvalidConfig {
            details: format!("{key} must be an integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_env_bool(key: &str, target: &mut bool) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(JanitorError::InvalidConfig {
                    details: format!("{key} must be a boolean, got {raw:?}"),
                });
            }
        };
    }
    Ok(())
}

fn set_env_path(key: &str, target: &mut PathBuf) {
    if let Some(value) = env::var_os(key) {
        *target = PathBuf::from(value);
    }
}
