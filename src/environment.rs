//! Makes sure the transcode tool (ffmpeg) can be reached before any download.
//!
//! Nothing here mutates the process or user environment. A copy found outside
//! the search path is handed to yt-dlp through `--ffmpeg-location` instead.

use std::{
    env,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::{debug, info};

use crate::error::EnvironmentError;
use crate::settings::Settings;

const FFMPEG: &str = "ffmpeg";

/// Where the transcode tool was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeTool {
    /// Resolvable through the search path
    OnPath(PathBuf),
    /// Found in a fallback install directory
    Located { dir: PathBuf, binary: PathBuf },
}

impl TranscodeTool {
    pub fn binary(&self) -> &Path {
        match self {
            TranscodeTool::OnPath(binary) | TranscodeTool::Located { binary, .. } => binary.as_path(),
        }
    }

    /// Directory yt-dlp must be told about, if any
    pub fn ffmpeg_location(&self) -> Option<&Path> {
        match self {
            TranscodeTool::OnPath(_) => None,
            TranscodeTool::Located { dir, .. } => Some(dir.as_path()),
        }
    }
}

/// Locates ffmpeg using the process `PATH` and the configured fallbacks.
pub fn prepare_transcode_tool(settings: &Settings) -> Result<TranscodeTool, EnvironmentError> {
    let tool = locate_transcode_tool(env::var_os("PATH"), &settings.transcode_search_dirs)?;
    info!(binary = %tool.binary().display(), "transcode tool ready");
    Ok(tool)
}

/// Same as [`prepare_transcode_tool`] with an explicit search path. Repeated
/// calls give the same answer.
pub fn locate_transcode_tool(
    search_path: Option<impl AsRef<OsStr>>,
    fallback_dirs: &[PathBuf],
) -> Result<TranscodeTool, EnvironmentError> {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Some(path) = search_path {
        if let Ok(binary) = which::which_in(FFMPEG, Some(path), &cwd) {
            if verify(&binary) {
                return Ok(TranscodeTool::OnPath(binary));
            }
            debug!(binary = %binary.display(), "ffmpeg on PATH failed to run");
        }
    }

    for dir in fallback_dirs {
        let Ok(binary) = which::which_in(FFMPEG, Some(dir.as_os_str()), &cwd) else {
            debug!(dir = %dir.display(), "no ffmpeg in fallback directory");
            continue;
        };
        if verify(&binary) {
            return Ok(TranscodeTool::Located {
                dir: dir.clone(),
                binary,
            });
        }
    }

    Err(EnvironmentError::NotFound {
        searched: fallback_dirs.to_vec(),
    })
}

/// Runs `ffmpeg -version` and reports whether it exited cleanly.
fn verify(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}
