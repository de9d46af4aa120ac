use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::{Child, ChildStderr, ChildStdout, Command},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::fetch_config::FetchConfiguration;
use crate::progress::{ProgressReporter, parse_progress_from_line};

/// Something that can retrieve a remote resource according to a
/// [`FetchConfiguration`] and write the final file.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Runs one download to completion, feeding `reporter` as bytes arrive.
    ///
    /// Must return [`FetchError::Cancelled`] once `cancel` fires.
    async fn fetch(
        &self,
        config: &FetchConfiguration,
        url: &str,
        reporter: &mut ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<(), FetchError>;
}

/// Drives the `yt-dlp` executable as a child process
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
    /// Passed as `--ffmpeg-location` when set
    ffmpeg_dir: Option<PathBuf>,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>, ffmpeg_dir: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg_dir,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl FetchEngine for YtDlpEngine {
    async fn fetch(
        &self,
        config: &FetchConfiguration,
        url: &str,
        reporter: &mut ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<(), FetchError> {
        let args = config.to_args(url, self.ffmpeg_dir.as_deref());
        debug!(binary = %self.binary.display(), ?args, "spawning yt-dlp");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(FetchError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(FetchError::MissingPipe("stderr"))?;
        let stderr_task = tokio::spawn(error_line(stderr));

        let finished = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = run_to_exit(&mut child, stdout, reporter) => Some(result),
        };

        let Some(result) = finished else {
            if let Err(err) = child.kill().await {
                warn!(error = %err, "failed to kill yt-dlp after cancellation");
            }
            stderr_task.abort();
            return Err(FetchError::Cancelled);
        };

        let status = result?;
        let detail = stderr_task.await.ok().flatten();
        if status.success() {
            Ok(())
        } else {
            Err(FetchError::Exited {
                code: status.code(),
                detail: detail.unwrap_or_else(|| format!("yt-dlp exited with {status}")),
            })
        }
    }
}

async fn run_to_exit(
    child: &mut Child,
    stdout: ChildStdout,
    reporter: &mut ProgressReporter,
) -> Result<ExitStatus, FetchError> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    while let Some(line) = next_line_lossy(&mut reader, &mut buf).await? {
        match parse_progress_from_line(&line) {
            Some(event) => {
                reporter.on_progress(&event);
            }
            None => debug!(target: "tubesaver::yt_dlp", "{line}"),
        }
    }
    Ok(child.wait().await?)
}

/// Drains stderr and keeps the line that best explains a failure: the last
/// `ERROR:` line, else the last non-empty one.
async fn error_line(stderr: ChildStderr) -> Option<String> {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut last = None;
    let mut last_error = None;
    while let Ok(Some(line)) = next_line_lossy(&mut reader, &mut buf).await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(target: "tubesaver::yt_dlp", stream = "stderr", "{line}");
        if line.starts_with("ERROR:") {
            last_error = Some(line.to_owned());
        }
        last = Some(line.to_owned());
    }
    last_error.or(last)
}

/// Reads one line, replacing invalid UTF-8. `None` at end of stream.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
}
