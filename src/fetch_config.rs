//! Maps a download request onto the yt-dlp options that realize it.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::model::{DownloadRequest, MediaKind};
use crate::progress::PROGRESS_TEMPLATE;

/// yt-dlp output template field, substituted by the engine at run time
pub const TITLE_PLACEHOLDER: &str = "%(title)s";

const VIDEO_AUDIO_CODEC: &str = "aac";
const VIDEO_AUDIO_BITRATE: &str = "192k";

/// Post-processing step the engine hands to ffmpeg
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessing {
    /// Merge/convert into `container`, re-encoding the audio track
    RemuxVideo {
        container: &'static str,
        audio_codec: &'static str,
        audio_bitrate: &'static str,
    },
    /// Drop the video track and encode the audio with `codec`
    ExtractAudio { codec: &'static str },
}

/// Everything the fetch engine needs for one download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfiguration {
    /// yt-dlp format selector expression
    pub format: String,
    /// Destination path still containing the title placeholder
    pub output_template: PathBuf,
    pub post_processing: PostProcessing,
    /// Progress line template the engine prints for each update
    pub progress_template: &'static str,
}

/// Builds the engine configuration for `request`. Never fails.
pub fn build(request: &DownloadRequest) -> FetchConfiguration {
    let output_template = request.destination.join(format!(
        "{TITLE_PLACEHOLDER}.{}",
        request.kind.extension()
    ));

    let (format, post_processing) = match request.kind {
        MediaKind::Video => (
            format!(
                "bestvideo[height<={}]+bestaudio/best",
                request.quality.max_height()
            ),
            PostProcessing::RemuxVideo {
                container: MediaKind::Video.extension(),
                audio_codec: VIDEO_AUDIO_CODEC,
                audio_bitrate: VIDEO_AUDIO_BITRATE,
            },
        ),
        MediaKind::Audio => (
            "bestaudio/best".to_owned(),
            PostProcessing::ExtractAudio {
                codec: MediaKind::Audio.extension(),
            },
        ),
    };

    FetchConfiguration {
        format,
        output_template,
        post_processing,
        progress_template: PROGRESS_TEMPLATE,
    }
}

impl FetchConfiguration {
    /// Renders the yt-dlp command line, URL last.
    ///
    /// `ffmpeg_dir` is passed as `--ffmpeg-location` when the transcode tool
    /// lives outside the search path.
    pub fn to_args(&self, url: &str, ffmpeg_dir: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-f".into(), self.format.clone().into()];

        match &self.post_processing {
            PostProcessing::RemuxVideo {
                container,
                audio_codec,
                audio_bitrate,
            } => {
                args.push("--merge-output-format".into());
                args.push((*container).into());
                args.push("--recode-video".into());
                args.push((*container).into());
                args.push("--postprocessor-args".into());
                args.push(format!("ffmpeg:-c:a {audio_codec} -b:a {audio_bitrate}").into());
            }
            PostProcessing::ExtractAudio { codec } => {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push((*codec).into());
            }
        }

        if let Some(dir) = ffmpeg_dir {
            args.push("--ffmpeg-location".into());
            args.push(dir.as_os_str().to_owned());
        }

        args.push("--newline".into());
        args.push("--progress-template".into());
        args.push(format!("download:{}", self.progress_template).into());

        args.push("-o".into());
        args.push(self.output_template.as_os_str().to_owned());
        args.push(url.into());
        args
    }
}
