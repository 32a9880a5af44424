//! Transcripción screen.

use crate::widgets::{self, INPUT_ROW_HEIGHT, SCREEN_FOOTER_SPACING};
use crate::worker::{self, Poll};
use eframe::egui;
use lib::session::Message;
use lib::transcription::panel::GREETING;
use lib::transcription::upload::SEND_FAILED_NOTICE;
use lib::transcription::{Attachment, SendOutcome, TranscriptionClient, TranscriptionPanel};
use std::sync::mpsc;

pub struct TranscriptionView {
    panel: TranscriptionPanel,
    client: TranscriptionClient,
    pending: Option<mpsc::Receiver<SendOutcome>>,
    notice: Option<String>,
}

impl TranscriptionView {
    pub fn new(panel: TranscriptionPanel, client: TranscriptionClient) -> Self {
        Self {
            panel,
            client,
            pending: None,
            notice: None,
        }
    }

    /// True while a request is outstanding (keeps the UI repainting).
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn poll(&mut self) {
        if let Some(rx) = &self.pending {
            match worker::poll(rx) {
                Poll::Pending => {}
                Poll::Ready(outcome) => {
                    self.pending = None;
                    self.panel.complete(outcome);
                }
                Poll::Lost => {
                    self.pending = None;
                    self.panel.abandon_in_flight();
                    self.notice = Some(SEND_FAILED_NOTICE.to_string());
                }
            }
        }
        if self.notice.is_none() {
            self.notice = self.panel.take_notice();
        }
    }

    fn start_send(&mut self) {
        match self.panel.begin_send() {
            Ok(Some(job)) => {
                let client = self.client.clone();
                self.pending = Some(worker::run_in_background(move |rt| {
                    rt.block_on(job.run(&client))
                }));
            }
            Ok(None) => {}
            Err(rejection) => log::debug!("send rejected: {:?}", rejection),
        }
    }

    fn pick_file(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Audio o Word", &["mp3", "webm", "docx"])
            .add_filter("Todos los archivos", &["*"])
            .pick_file();
        let Some(path) = picked else {
            return;
        };
        match Attachment::from_path(&path) {
            Ok(a) => {
                self.panel.select_attachment(a);
            }
            Err(e) => {
                log::error!("reading {}: {}", path.display(), e);
                self.notice = Some(format!("No se pudo leer {}", path.display()));
            }
        }
    }

    pub fn ui(&mut self, ui: &mut egui::Ui) {
        widgets::screen_title(ui, "Transcripción");

        let blocked = self.notice.is_some();
        let busy = self.panel.is_busy();
        let reserved = INPUT_ROW_HEIGHT * 3.0 + SCREEN_FOOTER_SPACING;

        ui.add_enabled_ui(!blocked, |ui| {
            if self.panel.log().is_empty() {
                widgets::message_list(ui, &[Message::bot(GREETING)], reserved);
            } else {
                widgets::message_list(ui, self.panel.log().as_slice(), reserved);
            }

            if busy {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("⏳ Procesando…");
                });
            }

            if let Some(a) = self.panel.attachment() {
                let label = format!("📎 {} ({})", a.name, widgets::human_size(a.bytes.len()));
                let preview = a.preview();
                let mut cancel = false;
                ui.horizontal(|ui| {
                    ui.label(label);
                    if let Some(ref p) = preview {
                        ui.hyperlink_to("🔊", widgets::playable_url(p));
                    }
                    if ui.add_enabled(!busy, egui::Button::new("✖ Cancelar")).clicked() {
                        cancel = true;
                    }
                });
                if cancel {
                    self.panel.cancel_attachment();
                }
            }

            ui.add_space(8.0);
            let mut send_now = false;
            ui.horizontal(|ui| {
                if ui.add_enabled(!busy, egui::Button::new("📁")).on_hover_text("Adjuntar archivo").clicked() {
                    self.pick_file();
                }
                let record_label = if self.panel.is_recording() { "⏹" } else { "🎤" };
                let record_hint = if self.panel.is_recording() {
                    "Detener grabación"
                } else {
                    "Grabar audio"
                };
                if ui
                    .add_enabled(!busy, egui::Button::new(record_label))
                    .on_hover_text(record_hint)
                    .clicked()
                {
                    let _ = self.panel.toggle_recording();
                }
                let send_width = 80.0;
                let response = ui.add_enabled(
                    !busy,
                    egui::TextEdit::singleline(&mut self.panel.input)
                        .hint_text("Escribe un mensaje…")
                        .desired_width(ui.available_width() - send_width),
                );
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    send_now = true;
                }
                if ui.add_enabled(!busy, egui::Button::new("Enviar")).clicked() {
                    send_now = true;
                }
            });
            if send_now {
                self.start_send();
            }
        });

        if let Some(text) = self.notice.clone() {
            if widgets::notice_window(ui.ctx(), &text) {
                self.notice = None;
            }
        }
    }
}

impl Drop for TranscriptionView {
    fn drop(&mut self) {
        if self.panel.is_recording() {
            let _ = self.panel.toggle_recording();
        }
        self.panel.abandon_in_flight();
    }
}
