//! TubeSaver: save a web video, or just its audio, to disk through yt-dlp

// yt-dlp child process driver
mod downloader;
// ffmpeg discovery before the window opens
mod environment;
mod error;
// Request -> yt-dlp options
mod fetch_config;
// Existing-file check
mod guard;
// Data models for requests, jobs and outcomes
mod model;
// Click handling and worker spawning
mod orchestrator;
// Progress parsing and the monotonic reporter
mod progress;
#[cfg(all(test, unix))]
mod script_fixture;
mod settings;
// Job registry and status line
mod state;

use std::{path::Path, sync::Arc, time::Duration};

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::{Color32, Visuals};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
use tokio::{runtime::Runtime, sync::mpsc::UnboundedReceiver};
use tracing::{debug, warn};

use downloader::YtDlpEngine;
use model::{DownloadInput, MediaKind, OutcomeStatus, Quality, Severity};
use orchestrator::{NativePrompt, Orchestrator};
use settings::Settings;
use state::{AppState, ViewUpdate};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Program entry point: prepares the environment and launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let settings = Settings::load();
    // A missing ffmpeg only surfaces later, as a failed download
    let ffmpeg_dir = match environment::prepare_transcode_tool(&settings) {
        Ok(tool) => tool.ffmpeg_location().map(Path::to_path_buf),
        Err(err) => {
            warn!(error = %err, "ffmpeg unavailable, conversions will fail");
            None
        }
    };

    let runtime = RUNTIME.get_or_try_init(Runtime::new)?;
    let engine = Arc::new(YtDlpEngine::new(settings.yt_dlp_binary.clone(), ffmpeg_dir));
    debug!(binary = %engine.binary().display(), "using yt-dlp");
    let (orchestrator, updates) =
        Orchestrator::new(engine, Box::new(NativePrompt), runtime.handle().clone());
    let app = TubeSaverApp::new(orchestrator, updates, settings.default_quality);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("TubeSaver")
            .with_inner_size([720.0, 420.0]),
        ..Default::default()
    };
    eframe::run_native(
        "TubeSaver",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(app)
        }),
    )?;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tubesaver=info".into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Window state. Only the UI thread touches it.
struct TubeSaverApp {
    /// Input field for the source URL
    url_input: String,
    /// Label of the selected quality rung
    selected_quality: String,
    state: AppState,
    orchestrator: Orchestrator,
    /// Worker updates, drained every frame
    updates: UnboundedReceiver<ViewUpdate>,
}

impl TubeSaverApp {
    fn new(
        orchestrator: Orchestrator,
        updates: UnboundedReceiver<ViewUpdate>,
        default_quality: Quality,
    ) -> Self {
        Self {
            url_input: String::new(),
            selected_quality: default_quality.label().to_owned(),
            state: AppState::default(),
            orchestrator,
            updates,
        }
    }
}

impl App for TubeSaverApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        while let Ok(update) = self.updates.try_recv() {
            self.state.apply(update);
        }

        // Right-side panel: one row per job
        egui::SidePanel::right("jobs_panel").show(ctx, |ui| {
            ui.heading("Downloads");
            ui.separator();

            let mut to_cancel = None;
            let mut to_dismiss = None;
            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                    for job in self.state.jobs() {
                        ui.group(|ui| {
                            ui.label(format!("{} {}", job.id, job.url));
                            ui.label(job_status_text(&job.status, job.kind));
                            ui.add(egui::ProgressBar::new(job.progress).show_percentage());
                            if job.status.is_terminal() {
                                if ui.button("Dismiss").clicked() {
                                    to_dismiss = Some(job.id);
                                }
                            } else if ui.button("Cancel").clicked() {
                                to_cancel = Some(job.id);
                            }
                        });
                    }
                });

            if let Some(id) = to_cancel {
                self.state.cancel(id);
            }
            if let Some(id) = to_dismiss {
                self.state.dismiss(id);
            }
        });

        // Main panel: URL, quality and the two download buttons
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading("TubeSaver");
                ui.add_space(10.0);

                ui.label("Enter the video URL:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.url_input)
                        .hint_text("https://www.youtube.com/watch?v=example")
                        .desired_width(400.0),
                );
                ui.add_space(10.0);

                ui.label("Choose the quality:");
                egui::ComboBox::from_id_source("quality")
                    .selected_text(&self.selected_quality)
                    .show_ui(ui, |ui| {
                        for quality in Quality::LADDER {
                            ui.selectable_value(
                                &mut self.selected_quality,
                                quality.label().to_owned(),
                                quality.label(),
                            );
                        }
                    });
                ui.add_space(10.0);

                let mut pressed = None;
                ui.horizontal(|ui| {
                    if ui.button("Download Video").clicked() {
                        pressed = Some(MediaKind::Video);
                    }
                    if ui.button("Download Audio").clicked() {
                        pressed = Some(MediaKind::Audio);
                    }
                });
                if let Some(kind) = pressed {
                    let input = DownloadInput {
                        url: self.url_input.clone(),
                        kind,
                        quality: self.selected_quality.clone(),
                    };
                    let outcome = self.orchestrator.start(&mut self.state, input);
                    debug!(?outcome, "download request handled");
                }
                ui.add_space(10.0);

                let (text, severity) = self.state.status();
                ui.colored_label(severity_color(severity), text);
                ui.add(egui::ProgressBar::new(self.state.headline_progress()).desired_width(400.0));
            });
        });

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

fn severity_color(severity: Severity) -> Color32 {
    match severity {
        Severity::Info => Color32::LIGHT_BLUE,
        Severity::Progress => Color32::WHITE,
        Severity::Success => Color32::GREEN,
        Severity::Error => Color32::RED,
    }
}

fn job_status_text(status: &OutcomeStatus, kind: MediaKind) -> String {
    match status {
        OutcomeStatus::Pending => "Waiting".to_owned(),
        OutcomeStatus::Running => match kind {
            MediaKind::Video => "⬇ Downloading video".to_owned(),
            MediaKind::Audio => "⬇ Downloading audio".to_owned(),
        },
        OutcomeStatus::Succeeded => "✅ Done".to_owned(),
        OutcomeStatus::Failed(reason) => format!("❌ {reason}"),
        OutcomeStatus::SkippedExisting(path) => format!("Already exists: {}", path.display()),
        OutcomeStatus::Cancelled => "Cancelled".to_owned(),
    }
}
