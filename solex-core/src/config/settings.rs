//! Application settings for Solex.
//!
//! Settings are persisted to the SQLite database as JSON.

use serde::{Deserialize, Serialize};

// =============================================================================
// Theme Selection
// =============================================================================

/// App theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Theme {
    /// Dark theme (easier on the eyes)
    #[default]
    Dark,
    /// Light theme
    Light,
}

impl Theme {
    /// Get all available themes.
    pub fn all() -> &'static [Theme] {
        &[Self::Dark, Self::Light]
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dark => write!(f, "Dark"),
            Self::Light => write!(f, "Light"),
        }
    }
}

// =============================================================================
// Application Settings
// =============================================================================

/// Settings key under which the JSON blob is stored.
const SETTINGS_KEY: &str = "settings";

/// Application settings - persisted to database as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Last-used organization URL (scheme optional).
    #[serde(default)]
    pub server_url: String,

    /// Export directory for solution zips.
    #[serde(default)]
    pub export_dir: Option<String>,

    /// UI theme.
    #[serde(default)]
    pub theme: Theme,
}

impl Settings {
    /// Load settings from database, using defaults for missing values.
    ///
    /// If settings don't exist or can't be parsed, returns defaults.
    pub fn load(db: &crate::db::Database) -> Self {
        let mut settings = Self::default();

        if let Ok(Some(json)) = db.get_setting(SETTINGS_KEY) {
            match serde_json::from_str::<Settings>(&json) {
                Ok(loaded) => settings = loaded,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse settings, using defaults");
                }
            }
        }

        settings
    }

    /// Save settings to the database as JSON.
    pub fn save(&self, db: &crate::db::Database) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        db.set_setting(SETTINGS_KEY, &json)?;
        Ok(())
    }
}
