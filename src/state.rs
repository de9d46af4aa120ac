//! Application state shared by the view and the download orchestrator.
//!
//! Workers never touch this directly: they post [`ViewUpdate`]s on a channel
//! and the UI thread folds them in with [`AppState::apply`].

use std::{collections::BTreeMap, path::PathBuf};

use tokio_util::sync::CancellationToken;

use crate::model::{DownloadRequest, JobId, MediaKind, OutcomeStatus, Severity};

/// Message posted by a worker for the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    Started { job: JobId },
    Progress { job: JobId, fraction: f32 },
    Finished { job: JobId, outcome: OutcomeStatus },
}

/// One entry in the job registry
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub kind: MediaKind,
    pub url: String,
    /// Monotonic within the job, starts at 0.0
    pub progress: f32,
    pub status: OutcomeStatus,
    cancel: CancellationToken,
}

#[derive(Debug)]
pub struct AppState {
    jobs: BTreeMap<JobId, Job>,
    status_text: String,
    severity: Severity,
    /// Job whose progress drives the headline bar
    latest: Option<JobId>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            jobs: BTreeMap::new(),
            status_text: String::new(),
            severity: Severity::Info,
            latest: None,
        }
    }
}

impl AppState {
    pub fn status(&self) -> (&str, Severity) {
        (&self.status_text, self.severity)
    }

    pub fn set_status(&mut self, text: impl Into<String>, severity: Severity) {
        self.status_text = text.into();
        self.severity = severity;
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    #[cfg(test)]
    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Progress of the most recently started job, 0.0 when there is none.
    pub fn headline_progress(&self) -> f32 {
        self.latest
            .and_then(|id| self.jobs.get(&id))
            .map_or(0.0, |job| job.progress)
    }

    /// Registers a pending job with fresh progress.
    pub fn begin_job(&mut self, id: JobId, request: &DownloadRequest, cancel: CancellationToken) {
        self.jobs.insert(
            id,
            Job {
                id,
                kind: request.kind,
                url: request.source_url.clone(),
                progress: 0.0,
                status: OutcomeStatus::Pending,
                cancel,
            },
        );
        self.latest = Some(id);

        let text = match request.kind {
            MediaKind::Video => "Downloading video...",
            MediaKind::Audio => "Downloading audio...",
        };
        self.set_status(text, Severity::Progress);
    }

    /// Records a request that never ran because its output already existed.
    pub fn record_skipped(&mut self, id: JobId, request: &DownloadRequest, path: PathBuf) {
        self.jobs.insert(
            id,
            Job {
                id,
                kind: request.kind,
                url: request.source_url.clone(),
                progress: 0.0,
                status: OutcomeStatus::Pending,
                cancel: CancellationToken::new(),
            },
        );
        self.apply(ViewUpdate::Finished {
            job: id,
            outcome: OutcomeStatus::SkippedExisting(path),
        });
    }

    pub fn apply(&mut self, update: ViewUpdate) {
        match update {
            ViewUpdate::Started { job } => {
                if let Some(entry) = self.jobs.get_mut(&job) {
                    if entry.status == OutcomeStatus::Pending {
                        entry.status = OutcomeStatus::Running;
                    }
                }
            }
            ViewUpdate::Progress { job, fraction } => {
                if let Some(entry) = self.jobs.get_mut(&job) {
                    if !entry.status.is_terminal() && fraction > entry.progress {
                        entry.progress = fraction.min(1.0);
                    }
                }
            }
            ViewUpdate::Finished { job, outcome } => {
                let Some(entry) = self.jobs.get_mut(&job) else {
                    return;
                };
                if entry.status.is_terminal() {
                    return;
                }
                if outcome == OutcomeStatus::Succeeded {
                    entry.progress = 1.0;
                }
                let (text, severity) = match &outcome {
                    OutcomeStatus::Succeeded => ("Download complete!".to_owned(), Severity::Success),
                    OutcomeStatus::Failed(reason) => (format!("Error: {reason}"), Severity::Error),
                    OutcomeStatus::Cancelled => ("Download cancelled.".to_owned(), Severity::Info),
                    OutcomeStatus::SkippedExisting(path) => (
                        format!("File already exists: {}", path.display()),
                        Severity::Info,
                    ),
                    OutcomeStatus::Pending | OutcomeStatus::Running => return,
                };
                entry.status = outcome;
                self.set_status(text, severity);
            }
        }
    }

    /// Asks a running job to stop. Returns false if it is unknown or done.
    pub fn cancel(&mut self, id: JobId) -> bool {
        match self.jobs.get(&id) {
            Some(job) if !job.status.is_terminal() => {
                job.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Removes a finished job from the registry.
    pub fn dismiss(&mut self, id: JobId) -> bool {
        let finished = self
            .jobs
            .get(&id)
            .is_some_and(|job| job.status.is_terminal());
        if finished {
            self.jobs.remove(&id);
            if self.latest == Some(id) {
                self.latest = None;
            }
        }
        finished
    }
}
