//! IPETH Desktop: shell (top bar, sidebar, welcome screen), logs screen, and panel mounting.

use crate::dashboard_view::DashboardView;
use crate::transcription_view::TranscriptionView;
use crate::tutor_view::TutorView;
use crate::widgets::{self, SCREEN_FOOTER_SPACING};
use eframe::egui;
use lib::config::Config;
use lib::shell::{Panel, Shell, Transition, WELCOME_HINT, WELCOME_TITLE};
use lib::store::{FileStore, KeyValueStore};
use lib::transcription::{CommandSource, Recorder, TranscriptionClient, TranscriptionPanel};
use lib::tutor::{SessionContext, TutorClient, TutorPanel};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

const LOG_BUFFER_MAX_LINES: usize = 2000;
const SIDEBAR_WIDTH: f32 = 160.0;
const WAITING_REPAINT: Duration = Duration::from_millis(100);

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        // Keep HTTP stack chatter out of the buffer.
        metadata.level() <= log::Level::Info || metadata.target().starts_with("lib")
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

/// The mounted panel. Replacing it drops the previous panel's state.
enum Mounted {
    None,
    Transcription(TranscriptionView),
    Tutor(TutorView),
    Dashboard(DashboardView),
}

pub struct IpethApp {
    config: Config,
    config_path: PathBuf,
    store: Arc<dyn KeyValueStore>,
    shell: Shell,
    show_logs: bool,
    mounted: Mounted,
}

impl IpethApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        let (config, config_path) = match lib::config::load_config(None) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::error!("loading config, using defaults: {:#}", e);
                (Config::default(), lib::config::default_config_path())
            }
        };
        let state_path = lib::config::resolve_state_path(&config, &config_path);
        log::debug!("local state at {}", state_path.display());

        Self {
            config,
            config_path,
            store: Arc::new(FileStore::new(state_path)),
            shell: Shell::new(),
            show_logs: false,
            mounted: Mounted::None,
        }
    }

    fn mount(&mut self, panel: Panel) {
        // Drop the old view first so its recorder and in-flight request are released.
        self.mounted = Mounted::None;
        self.mounted = match panel {
            Panel::Transcription => {
                let client =
                    TranscriptionClient::new(lib::config::resolve_transcription_url(&self.config));
                let recorder = Recorder::new(Box::new(CommandSource::ffmpeg(&self.config.capture)))
                    .with_clip_dir(lib::config::resolve_clip_dir(&self.config_path));
                Mounted::Transcription(TranscriptionView::new(TranscriptionPanel::new(recorder), client))
            }
            Panel::Tutor => {
                let client = TutorClient::new(lib::config::resolve_tutor_url(&self.config));
                let panel = TutorPanel::new(
                    SessionContext::new(self.store.clone()),
                    self.config.tutor.forget_rejected_identity,
                );
                Mounted::Tutor(TutorView::new(panel, client))
            }
            Panel::Dashboard => {
                let client = lib::dashboard::DashboardClient::new(lib::config::resolve_dashboard_url(
                    &self.config,
                ));
                Mounted::Dashboard(DashboardView::new(client, self.config.dashboard.level.clone()))
            }
        };
    }

    fn select(&mut self, panel: Panel) {
        self.show_logs = false;
        if let Transition::Mount(p) = self.shell.select(panel) {
            self.mount(p);
        }
    }

    fn select_logs(&mut self) {
        self.show_logs = true;
        self.shell.deselect();
        self.mounted = Mounted::None;
    }

    /// Poll the mounted panel's request; true while it is still waiting.
    fn poll_mounted(&mut self) -> bool {
        match &mut self.mounted {
            Mounted::None => false,
            Mounted::Transcription(v) => {
                v.poll();
                v.is_waiting()
            }
            Mounted::Tutor(v) => {
                v.poll();
                v.is_waiting()
            }
            Mounted::Dashboard(v) => {
                v.poll();
                v.is_waiting()
            }
        }
    }

    fn ui_welcome(ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() / 3.0);
            ui.heading(WELCOME_TITLE);
            ui.add_space(8.0);
            ui.label(WELCOME_HINT);
        });
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        widgets::screen_title(ui, "Logs");

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(
                        egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace),
                    );
                }
                if lines.is_empty() {
                    ui.label("Sin registros todavía.");
                }
            });
        ui.add_space(SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for IpethApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.poll_mounted() {
            ctx.request_repaint_after(WAITING_REPAINT);
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.heading("IPETH");
                        ui.label("Asistente educativo");
                    });
                    ui.add_space(16.0);
                });
        });

        let selected = self.shell.selected();
        let show_logs = self.show_logs;
        let mut clicked_panel = None;
        let mut clicked_logs = false;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(SIDEBAR_WIDTH)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        for panel in Panel::ALL {
                            if ui.selectable_label(selected == Some(panel), panel.title()).clicked() {
                                clicked_panel = Some(panel);
                            }
                            ui.add_space(12.0);
                        }
                        ui.separator();
                        ui.add_space(12.0);
                        if ui.selectable_label(show_logs, "Logs").clicked() {
                            clicked_logs = true;
                        }
                    });
            });
        if let Some(panel) = clicked_panel {
            self.select(panel);
        } else if clicked_logs {
            self.select_logs();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    if self.show_logs {
                        self.ui_logs_screen(ui);
                        return;
                    }
                    match &mut self.mounted {
                        Mounted::None => Self::ui_welcome(ui),
                        Mounted::Transcription(v) => v.ui(ui),
                        Mounted::Tutor(v) => v.ui(ui),
                        Mounted::Dashboard(v) => v.ui(ui),
                    }
                });
        });
    }
}
