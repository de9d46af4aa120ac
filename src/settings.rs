use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SettingsError;
use crate::model::Quality;

/// User settings, read once at startup from
/// `<config dir>/tubesaver/settings.json`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// yt-dlp executable, resolved through PATH when not absolute
    pub yt_dlp_binary: PathBuf,
    /// Preselected entry of the quality combo box
    pub default_quality: Quality,
    /// Where to look for ffmpeg when it is not on PATH
    pub transcode_search_dirs: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            yt_dlp_binary: PathBuf::from("yt-dlp"),
            default_quality: Quality::default(),
            transcode_search_dirs: default_transcode_dirs(),
        }
    }
}

fn default_transcode_dirs() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        vec![PathBuf::from(r"C:\Program Files\TubeSaver\build\asset")]
    } else {
        Vec::new()
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tubesaver").join("settings.json"))
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads from the default location, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        Self::load_from(&path).unwrap_or_else(|err| {
            warn!(error = %err, "ignoring settings file");
            Self::default()
        })
    }
}
