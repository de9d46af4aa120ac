use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// What the user wants written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Video with merged audio, remuxed to mp4
    Video,
    /// Audio only, encoded to mp3
    Audio,
}

impl MediaKind {
    /// Container extension of the final file
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }
}

/// Fixed quality ladder offered in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "4K")]
    Uhd4k,
}

impl Quality {
    /// All rungs in display order
    pub const LADDER: [Quality; 5] = [
        Quality::P480,
        Quality::P720,
        Quality::P1080,
        Quality::P1440,
        Quality::Uhd4k,
    ];

    /// Parses a UI label. Anything that is not exactly a ladder label,
    /// including padded or differently cased text, falls back to 720p.
    pub fn from_label(label: &str) -> Self {
        Self::LADDER
            .into_iter()
            .find(|q| q.label() == label)
            .unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::P1440 => "1440p",
            Quality::Uhd4k => "4K",
        }
    }

    /// Height ceiling used in the format selector
    pub fn max_height(self) -> u32 {
        match self {
            Quality::P480 => 480,
            Quality::P720 => 720,
            Quality::P1080 => 1080,
            Quality::P1440 => 1440,
            Quality::Uhd4k => 4320,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw user intent as captured from the input widgets
#[derive(Debug, Clone)]
pub struct DownloadInput {
    /// URL field contents, untrimmed
    pub url: String,
    /// Which button was pressed
    pub kind: MediaKind,
    /// Quality combo box label
    pub quality: String,
}

/// Validated, immutable request for one download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Trimmed, non-empty source URL
    pub source_url: String,
    pub kind: MediaKind,
    /// Only meaningful for video
    pub quality: Quality,
    /// Folder picked by the user
    pub destination: PathBuf,
}

/// Identifier of one started download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Represents the current state of a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Request created, worker not started yet
    Pending,
    /// Worker is driving the fetch engine
    Running,
    /// File written
    Succeeded,
    /// Engine reported an error
    Failed(String),
    /// Output path already existed, nothing fetched
    SkippedExisting(PathBuf),
    /// Stopped on user request
    Cancelled,
}

impl OutcomeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutcomeStatus::Pending | OutcomeStatus::Running)
    }
}

/// How the status line should be emphasized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Progress,
    Success,
    Error,
}
