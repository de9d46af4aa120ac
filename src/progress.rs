use tokio::sync::mpsc::UnboundedSender;

use crate::model::JobId;
use crate::state::ViewUpdate;

/// Leading token of every progress line we ask yt-dlp to print
pub const PROGRESS_MARKER: &str = "tubesaver-progress";

/// Registered with yt-dlp through `--progress-template download:...`
pub const PROGRESS_TEMPLATE: &str = "tubesaver-progress %(progress.status)s \
     %(progress.downloaded_bytes)s %(progress.total_bytes)s";

/// One progress notification from the fetch engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Engine phase, e.g. `downloading` or `finished`
    pub status: String,
    pub downloaded_bytes: Option<u64>,
    /// Unknown for some streams
    pub total_bytes: Option<u64>,
}

impl ProgressEvent {
    #[cfg(test)]
    pub fn downloading(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        Self {
            status: "downloading".to_owned(),
            downloaded_bytes: Some(downloaded_bytes),
            total_bytes,
        }
    }

    /// Fraction in [0, 1], or `None` when the total is unknown or zero.
    pub fn fraction(&self) -> Option<f32> {
        let total = self.total_bytes.filter(|t| *t > 0)?;
        let done = self.downloaded_bytes.unwrap_or(0);
        Some((done as f64 / total as f64).min(1.0) as f32)
    }
}

/// Parses a line printed through [`PROGRESS_TEMPLATE`]. yt-dlp prints `NA`
/// for missing numbers.
pub fn parse_progress_from_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = rest.split_whitespace();
    let status = fields.next()?.to_owned();
    let downloaded_bytes = fields.next().and_then(parse_bytes);
    let total_bytes = fields.next().and_then(parse_bytes);
    Some(ProgressEvent {
        status,
        downloaded_bytes,
        total_bytes,
    })
}

fn parse_bytes(field: &str) -> Option<u64> {
    // Some extractors report fractional byte counts
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

/// Monotonic progress sink for one job.
///
/// Forwards a new fraction to the view only when it is strictly greater than
/// the last one forwarded, so out-of-order or re-queried size events never
/// move the bar backwards.
pub struct ProgressReporter {
    job: JobId,
    current: f32,
    updates: UnboundedSender<ViewUpdate>,
}

impl ProgressReporter {
    /// Starts at 0.0 for a fresh download.
    pub fn new(job: JobId, updates: UnboundedSender<ViewUpdate>) -> Self {
        Self {
            job,
            current: 0.0,
            updates,
        }
    }

    #[cfg(test)]
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Returns whether the event moved the progress forward.
    pub fn on_progress(&mut self, event: &ProgressEvent) -> bool {
        if event.status != "downloading" {
            return false;
        }
        let Some(fraction) = event.fraction() else {
            return false;
        };
        if fraction <= self.current {
            return false;
        }

        self.current = fraction;
        // The view may already be gone during shutdown
        let _ = self.updates.send(ViewUpdate::Progress {
            job: self.job,
            fraction,
        });
        true
    }
}
