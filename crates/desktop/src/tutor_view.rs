//! Tutor screen with the identity prompt.

use crate::widgets::{self, INPUT_ROW_HEIGHT, SCREEN_FOOTER_SPACING};
use crate::worker::{self, Poll};
use eframe::egui;
use lib::guard::Ticket;
use lib::tutor::{ChatReply, PendingImage, TutorClient, TutorError, TutorPanel};
use std::sync::mpsc;

pub struct TutorView {
    panel: TutorPanel,
    client: TutorClient,
    pending: Option<(Ticket, mpsc::Receiver<Result<ChatReply, TutorError>>)>,
    image_error: Option<String>,
}

impl TutorView {
    pub fn new(panel: TutorPanel, client: TutorClient) -> Self {
        Self {
            panel,
            client,
            pending: None,
            image_error: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn poll(&mut self) {
        let Some((ticket, rx)) = &self.pending else {
            return;
        };
        let ticket = *ticket;
        match worker::poll(rx) {
            Poll::Pending => {}
            Poll::Ready(result) => {
                self.pending = None;
                self.panel.complete(ticket, result);
            }
            Poll::Lost => {
                self.pending = None;
                self.panel
                    .complete(ticket, Err(TutorError::Api("request worker stopped".to_string())));
            }
        }
    }

    fn start_send(&mut self) {
        let Some(job) = self.panel.begin_send() else {
            return;
        };
        let client = self.client.clone();
        let request = job.request;
        let rx = worker::run_in_background(move |rt| rt.block_on(client.send(&request)));
        self.pending = Some((job.ticket, rx));
    }

    fn pick_image(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Imágenes", &["png", "jpg", "jpeg", "gif", "webp", "bmp"])
            .pick_file();
        let Some(path) = picked else {
            return;
        };
        match PendingImage::from_path(&path) {
            Ok(img) => {
                self.image_error = None;
                self.panel.attach_image(img);
            }
            Err(e) => {
                log::error!("reading image {}: {}", path.display(), e);
                self.image_error = Some(e.to_string());
            }
        }
    }

    pub fn ui(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.horizontal(|ui| {
            ui.heading("Tutor");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let can_change = self.panel.gate().identity().is_some() && !self.panel.is_busy();
                if ui
                    .add_enabled(can_change, egui::Button::new("Cambiar matrícula"))
                    .clicked()
                {
                    self.panel.gate_mut().open_change();
                }
                if let Some(id) = self.panel.gate().identity() {
                    ui.label(egui::RichText::new(format!("👤 {}", id)).strong());
                }
            });
        });
        ui.add_space(widgets::SCREEN_TITLE_BOTTOM_SPACING);

        let enabled = self.panel.input_enabled();
        let reserved = INPUT_ROW_HEIGHT * 3.0 + SCREEN_FOOTER_SPACING;
        widgets::message_list(ui, self.panel.log().as_slice(), reserved);

        if self.panel.is_busy() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("⏳ Escribiendo respuesta…");
            });
        }

        if let Some(img) = self.panel.image() {
            let label = format!("📷 {} ({})", img.mime, widgets::human_size(img.bytes.len()));
            let mut remove = false;
            ui.horizontal(|ui| {
                ui.label(label);
                if ui.add_enabled(enabled, egui::Button::new("✖")).clicked() {
                    remove = true;
                }
            });
            if remove {
                self.panel.clear_image();
            }
        }
        if let Some(ref err) = self.image_error {
            ui.colored_label(ui.visuals().error_fg_color, err);
        }

        ui.add_space(8.0);
        let mut send_now = false;
        ui.horizontal(|ui| {
            if ui
                .add_enabled(enabled, egui::Button::new("🖼"))
                .on_hover_text("Adjuntar imagen")
                .clicked()
            {
                self.pick_image();
            }
            let send_width = 80.0;
            let response = ui.add_enabled(
                enabled,
                egui::TextEdit::singleline(&mut self.panel.input)
                    .hint_text("Escribe tu pregunta…")
                    .desired_width(ui.available_width() - send_width),
            );
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                send_now = true;
            }
            if ui.add_enabled(enabled, egui::Button::new("Enviar")).clicked() {
                send_now = true;
            }
        });
        if send_now {
            self.start_send();
        }

        if self.panel.gate().is_prompt_open() {
            self.identity_window(ui.ctx());
        }
    }

    fn identity_window(&mut self, ctx: &egui::Context) {
        let mut submit = false;
        let mut cancel = false;
        let can_cancel = self.panel.gate().can_cancel();
        let error = self.panel.gate().error().map(String::from);
        egui::Window::new("Identifícate")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Ingresa tu matrícula para continuar.");
                ui.add_space(8.0);
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.panel.gate_mut().draft)
                        .hint_text("Ej. UNIV011"),
                );
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }
                if let Some(ref e) = error {
                    ui.colored_label(ui.visuals().error_fg_color, e);
                }
                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    if ui.add_enabled(can_cancel, egui::Button::new("Cancelar")).clicked() {
                        cancel = true;
                    }
                    if ui.button("Guardar").clicked() {
                        submit = true;
                    }
                });
            });
        if cancel {
            self.panel.gate_mut().cancel();
        } else if submit {
            if let Err(e) = self.panel.submit_identity() {
                log::debug!("identity rejected locally: {}", e);
            }
        }
    }
}

impl Drop for TutorView {
    fn drop(&mut self) {
        self.panel.abandon_in_flight();
    }
}
