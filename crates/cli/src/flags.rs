//! Feature flags read from the user's config directory.
//!
//! A small TOML file toggles optional CLI behaviour; a missing or
//! unreadable file means every flag is off. Flags never gate core auth
//! behaviour, only presentation (`show-token`) and error verbosity
//! (`verbose-errors`).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// Feature toggles for the CLI surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FeatureSet {
    /// Include raw encoded tokens in `session show` output.
    pub show_token: bool,

    /// Append underlying error detail to the error envelope.
    pub verbose_errors: bool,
}

impl FeatureSet {
    /// Load flags from the default config location.
    #[must_use]
    pub fn load() -> Self {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load flags from a specific file, falling back to defaults.
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return Self::default();
        };

        match toml::from_str(&raw) {
            Ok(flags) => flags,
            Err(err) => {
                warn!(path = %path.display(), "ignoring malformed feature config: {err}");
                Self::default()
            }
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("avalanchecms").join("cli").join("features.toml"))
}
