//! Turns user intent into a running download.
//!
//! [`Orchestrator::start`] runs on the UI thread: it validates input, asks for
//! a destination, builds the fetch configuration, applies the collision guard
//! and finally spawns one worker on the tokio runtime. Workers report back
//! exclusively through the [`ViewUpdate`] channel.

use std::{path::PathBuf, sync::Arc, time::Instant};

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::downloader::FetchEngine;
use crate::error::{FetchError, ValidationError};
use crate::fetch_config::{self, FetchConfiguration};
use crate::guard;
use crate::model::{DownloadInput, DownloadRequest, JobId, OutcomeStatus, Quality, Severity};
use crate::progress::ProgressReporter;
use crate::state::{AppState, ViewUpdate};

/// Interactive prompts the orchestrator needs from the desktop
pub trait Prompt {
    /// Folder picker; `None` when the user cancels
    fn pick_folder(&self) -> Option<PathBuf>;
    /// Blocking informational notice
    fn show_info(&self, title: &str, message: &str);
}

/// Native dialogs through `rfd`
pub struct NativePrompt;

impl Prompt for NativePrompt {
    fn pick_folder(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Choose a download folder")
            .pick_folder()
    }

    fn show_info(&self, title: &str, message: &str) {
        rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Info)
            .set_title(title)
            .set_description(message)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }
}

/// What happened to one click on a download button
#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// Input rejected, status line updated
    Rejected(ValidationError),
    /// No folder chosen
    Cancelled,
    /// Output path already present
    SkippedExisting(PathBuf),
    /// Worker spawned
    Started(JobId),
}

pub struct Orchestrator {
    engine: Arc<dyn FetchEngine>,
    prompt: Box<dyn Prompt>,
    runtime: Handle,
    updates: UnboundedSender<ViewUpdate>,
    next_job: u64,
}

impl Orchestrator {
    /// Returns the orchestrator and the receiving end of its update channel,
    /// which the view drains on its own thread.
    pub fn new(
        engine: Arc<dyn FetchEngine>,
        prompt: Box<dyn Prompt>,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<ViewUpdate>) {
        let (updates, rx) = unbounded_channel();
        let orchestrator = Self {
            engine,
            prompt,
            runtime,
            updates,
            next_job: 0,
        };
        (orchestrator, rx)
    }

    pub fn start(&mut self, state: &mut AppState, input: DownloadInput) -> StartOutcome {
        let url = input.url.trim();
        if url.is_empty() {
            let err = ValidationError::EmptyUrl;
            state.set_status(err.to_string(), Severity::Error);
            return StartOutcome::Rejected(err);
        }

        let Some(destination) = self.prompt.pick_folder() else {
            debug!("folder selection cancelled");
            return StartOutcome::Cancelled;
        };

        let request = DownloadRequest {
            source_url: url.to_owned(),
            kind: input.kind,
            quality: Quality::from_label(&input.quality),
            destination,
        };
        let config = fetch_config::build(&request);
        debug!(kind = ?request.kind, quality = %request.quality, "fetch configuration built");

        self.next_job += 1;
        let job = JobId(self.next_job);

        if guard::should_skip(&config.output_template) {
            let path = config.output_template;
            info!(%job, path = %path.display(), "output exists, skipping download");
            self.prompt
                .show_info("File exists", &format!("File already exists: {}", path.display()));
            state.record_skipped(job, &request, path.clone());
            return StartOutcome::SkippedExisting(path);
        }

        let cancel = CancellationToken::new();
        state.begin_job(job, &request, cancel.clone());

        let worker = run_worker(
            job,
            Arc::clone(&self.engine),
            config,
            request.source_url,
            self.updates.clone(),
            cancel,
        );
        let updates = self.updates.clone();
        self.runtime.spawn(async move {
            // A panicking engine must still leave the job in a terminal state
            if let Err(err) = tokio::spawn(worker).await {
                error!(%job, error = %err, "download worker crashed");
                let _ = updates.send(ViewUpdate::Finished {
                    job,
                    outcome: OutcomeStatus::Failed(format!("download worker crashed: {err}")),
                });
            }
        });

        StartOutcome::Started(job)
    }
}

async fn run_worker(
    job: JobId,
    engine: Arc<dyn FetchEngine>,
    config: FetchConfiguration,
    url: String,
    updates: UnboundedSender<ViewUpdate>,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    info!(%job, %url, format = %config.format, "download started");
    let _ = updates.send(ViewUpdate::Started { job });

    let mut reporter = ProgressReporter::new(job, updates.clone());
    let outcome = match engine.fetch(&config, &url, &mut reporter, cancel).await {
        Ok(()) => {
            info!(%job, elapsed = ?started.elapsed(), "download finished");
            OutcomeStatus::Succeeded
        }
        Err(FetchError::Cancelled) => {
            info!(%job, "download cancelled");
            OutcomeStatus::Cancelled
        }
        Err(err) => {
            let exit_code = match &err {
                FetchError::Exited { code, .. } => *code,
                _ => None,
            };
            error!(%job, error = %err, ?exit_code, "download failed");
            OutcomeStatus::Failed(err.to_string())
        }
    };

    let _ = updates.send(ViewUpdate::Finished { job, outcome });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaKind;
    use crate::progress::ProgressEvent;
    use async_trait::async_trait;
    use std::{fs, sync::Mutex};

    #[derive(Clone, Copy)]
    enum Script {
        Succeed,
        Fail(&'static str),
        WaitForCancel,
        Panic,
    }

    struct ScriptedEngine {
        events: Vec<ProgressEvent>,
        script: Script,
        calls: Mutex<Vec<(FetchConfiguration, String)>>,
    }

    impl ScriptedEngine {
        fn new(events: Vec<ProgressEvent>, script: Script) -> Arc<Self> {
            Arc::new(Self {
                events,
                script,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl FetchEngine for ScriptedEngine {
        async fn fetch(
            &self,
            config: &FetchConfiguration,
            url: &str,
            reporter: &mut ProgressReporter,
            cancel: CancellationToken,
        ) -> Result<(), FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((config.clone(), url.to_owned()));
            for event in &self.events {
                reporter.on_progress(event);
            }
            match self.script {
                Script::Succeed => Ok(()),
                Script::Fail(detail) => Err(FetchError::Exited {
                    code: Some(1),
                    detail: detail.to_owned(),
                }),
                Script::WaitForCancel => {
                    cancel.cancelled().await;
                    Err(FetchError::Cancelled)
                }
                Script::Panic => panic!("engine blew up"),
            }
        }
    }

    struct ScriptedPrompt {
        folder: Option<PathBuf>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Prompt for ScriptedPrompt {
        fn pick_folder(&self) -> Option<PathBuf> {
            self.log.lock().unwrap().push("pick".to_owned());
            self.folder.clone()
        }

        fn show_info(&self, _title: &str, message: &str) {
            self.log.lock().unwrap().push(format!("info: {message}"));
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        updates: UnboundedReceiver<ViewUpdate>,
        state: AppState,
        engine: Arc<ScriptedEngine>,
        prompt_log: Arc<Mutex<Vec<String>>>,
    }

    fn harness(folder: Option<PathBuf>, engine: Arc<ScriptedEngine>) -> Harness {
        let prompt_log = Arc::new(Mutex::new(Vec::new()));
        let prompt = ScriptedPrompt {
            folder,
            log: Arc::clone(&prompt_log),
        };
        let (orchestrator, updates) = Orchestrator::new(
            engine.clone() as Arc<dyn FetchEngine>,
            Box::new(prompt),
            Handle::current(),
        );
        Harness {
            orchestrator,
            updates,
            state: AppState::default(),
            engine,
            prompt_log,
        }
    }

    fn input(url: &str, kind: MediaKind, quality: &str) -> DownloadInput {
        DownloadInput {
            url: url.to_owned(),
            kind,
            quality: quality.to_owned(),
        }
    }

    impl Harness {
        fn start(&mut self, input: DownloadInput) -> StartOutcome {
            self.orchestrator.start(&mut self.state, input)
        }

        /// Applies updates until `job` reaches a terminal state.
        async fn run_until_finished(&mut self, job: JobId) -> Vec<ViewUpdate> {
            let mut seen = Vec::new();
            while let Some(update) = self.updates.recv().await {
                let done = matches!(update, ViewUpdate::Finished { job: j, .. } if j == job);
                seen.push(update.clone());
                self.state.apply(update);
                if done {
                    break;
                }
            }
            seen
        }
    }

    #[tokio::test]
    async fn video_download_runs_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new(
            vec![
                ProgressEvent::downloading(30, Some(100)),
                ProgressEvent::downloading(20, Some(100)),
                ProgressEvent::downloading(90, Some(100)),
            ],
            Script::Succeed,
        );
        let mut h = harness(Some(dir.path().to_path_buf()), engine);

        let outcome = h.start(input("  https://example.com/v  ", MediaKind::Video, "1080p"));
        let StartOutcome::Started(job) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(h.state.job(job).unwrap().status, OutcomeStatus::Pending);
        assert_eq!(h.state.status().0, "Downloading video...");

        let seen = h.run_until_finished(job).await;
        let fractions: Vec<f32> = seen
            .iter()
            .filter_map(|u| match u {
                ViewUpdate::Progress { fraction, .. } => Some(*fraction),
                _ => None,
            })
            .collect();
        assert_eq!(fractions, vec![0.3, 0.9]);

        let calls = h.engine.calls.lock().unwrap();
        let (config, url) = &calls[0];
        assert_eq!(url, "https://example.com/v");
        assert_eq!(config.format, "bestvideo[height<=1080]+bestaudio/best");
        assert_eq!(config.output_template, dir.path().join("%(title)s.mp4"));

        assert_eq!(h.state.job(job).unwrap().status, OutcomeStatus::Succeeded);
        assert_eq!(h.state.status(), ("Download complete!", Severity::Success));
    }

    #[tokio::test]
    async fn empty_url_is_rejected_without_prompting() {
        let engine = ScriptedEngine::new(Vec::new(), Script::Succeed);
        let mut h = harness(Some(PathBuf::from("/tmp")), engine);

        let outcome = h.start(input("   ", MediaKind::Audio, "720p"));

        assert_eq!(outcome, StartOutcome::Rejected(ValidationError::EmptyUrl));
        assert_eq!(h.state.status(), ("Please enter a valid URL.", Severity::Error));
        assert_eq!(h.state.headline_progress(), 0.0);
        assert_eq!(h.state.jobs().count(), 0);
        assert!(h.prompt_log.lock().unwrap().is_empty());
        assert!(h.engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_folder_choice_is_silent() {
        let engine = ScriptedEngine::new(Vec::new(), Script::Succeed);
        let mut h = harness(None, engine);

        let outcome = h.start(input("https://example.com/v", MediaKind::Video, "720p"));

        assert_eq!(outcome, StartOutcome::Cancelled);
        assert_eq!(h.state.status().0, "");
        assert_eq!(h.state.jobs().count(), 0);
        assert!(h.engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_templated_file_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("%(title)s.mp3");
        fs::write(&existing, b"").unwrap();
        let engine = ScriptedEngine::new(Vec::new(), Script::Succeed);
        let mut h = harness(Some(dir.path().to_path_buf()), engine);

        let outcome = h.start(input("https://example.com/a", MediaKind::Audio, "720p"));

        assert_eq!(outcome, StartOutcome::SkippedExisting(existing.clone()));
        let log = h.prompt_log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[1].starts_with("info: File already exists"));
        assert_eq!(h.state.status().1, Severity::Info);
        let jobs: Vec<_> = h.state.jobs().collect();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, OutcomeStatus::SkippedExisting(existing));
        assert!(h.engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn engine_error_is_reported_and_app_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new(
            vec![ProgressEvent::downloading(50, Some(100))],
            Script::Fail("ERROR: HTTP Error 403: Forbidden"),
        );
        let mut h = harness(Some(dir.path().to_path_buf()), engine);

        let StartOutcome::Started(first) =
            h.start(input("https://example.com/v", MediaKind::Video, "4K"))
        else {
            panic!("download did not start");
        };
        h.run_until_finished(first).await;

        let job = h.state.job(first).unwrap();
        assert_eq!(
            job.status,
            OutcomeStatus::Failed("ERROR: HTTP Error 403: Forbidden".to_owned())
        );
        assert_eq!(job.progress, 0.5);
        let (text, severity) = h.state.status();
        assert!(text.contains("HTTP Error 403: Forbidden"));
        assert_eq!(severity, Severity::Error);

        let second = h.start(input("https://example.com/v", MediaKind::Video, "4K"));
        assert_eq!(second, StartOutcome::Started(JobId(2)));
        assert_eq!(h.state.headline_progress(), 0.0);
    }

    #[tokio::test]
    async fn unknown_quality_falls_back_to_720() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new(Vec::new(), Script::Succeed);
        let mut h = harness(Some(dir.path().to_path_buf()), engine);

        let StartOutcome::Started(job) =
            h.start(input("https://example.com/v", MediaKind::Video, "1337p"))
        else {
            panic!("download did not start");
        };
        h.run_until_finished(job).await;

        let calls = h.engine.calls.lock().unwrap();
        assert_eq!(calls[0].0.format, "bestvideo[height<=720]+bestaudio/best");
    }

    #[tokio::test]
    async fn cancelling_a_job_ends_it_as_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new(Vec::new(), Script::WaitForCancel);
        let mut h = harness(Some(dir.path().to_path_buf()), engine);

        let StartOutcome::Started(job) =
            h.start(input("https://example.com/v", MediaKind::Audio, "720p"))
        else {
            panic!("download did not start");
        };
        assert!(h.state.cancel(job));
        h.run_until_finished(job).await;

        assert_eq!(h.state.job(job).unwrap().status, OutcomeStatus::Cancelled);
        assert_eq!(h.state.status().0, "Download cancelled.");
    }

    #[tokio::test]
    async fn panicking_engine_still_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new(Vec::new(), Script::Panic);
        let mut h = harness(Some(dir.path().to_path_buf()), engine);

        let StartOutcome::Started(job) =
            h.start(input("https://example.com/v", MediaKind::Video, "720p"))
        else {
            panic!("download did not start");
        };
        h.run_until_finished(job).await;

        match &h.state.job(job).unwrap().status {
            OutcomeStatus::Failed(reason) => assert!(reason.contains("crashed")),
            other => panic!("unexpected status {other:?}"),
        }
    }
}
