//! Session configuration, loaded from JSON with environment overrides.

use crate::camera::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};
use crate::presence::LocalUser;
use crate::shapes::{ProjectId, ShapeStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const ENV_PRESENCE_URL: &str = "SYNCSPACE_PRESENCE_URL";
pub const ENV_PROJECT: &str = "SYNCSPACE_PROJECT";
pub const ENV_USER_NAME: &str = "SYNCSPACE_USER_NAME";

pub const DEFAULT_PROJECT: &str = "default";
pub const DEFAULT_GRID_SIZE: f64 = 20.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything a [`Session`](crate::session::Session) needs besides its
/// collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub project_id: ProjectId,
    pub user: LocalUser,
    /// Presence relay, e.g. `ws://localhost:3001/ws`. No presence when unset.
    pub presence_url: Option<String>,
    pub grid_snap: bool,
    pub grid_size: f64,
    pub default_style: ShapeStyle,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Send at most one cursor update per frame.
    pub coalesce_cursor: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT.to_string(),
            user: LocalUser::default(),
            presence_url: None,
            grid_snap: false,
            grid_size: DEFAULT_GRID_SIZE,
            default_style: ShapeStyle::default(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            coalesce_cursor: true,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Apply `SYNCSPACE_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_PRESENCE_URL) {
            self.presence_url = (!url.is_empty()).then_some(url);
        }
        if let Some(project) = lookup(ENV_PROJECT).filter(|p| !p.is_empty()) {
            self.project_id = project;
        }
        if let Some(name) = lookup(ENV_USER_NAME).filter(|n| !n.is_empty()) {
            self.user.name = name;
        }
        self
    }

    /// Grid size when snapping is on.
    pub fn grid(&self) -> Option<f64> {
        (self.grid_snap && self.grid_size > 0.0).then_some(self.grid_size)
    }
}
