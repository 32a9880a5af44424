//! Shared drawing helpers for the panels.

use eframe::egui;
use lib::session::Message;
use lib::tutor::panel::decode_data_url;

pub const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
pub const SCREEN_FOOTER_SPACING: f32 = 24.0;
pub const INPUT_ROW_HEIGHT: f32 = 36.0;

/// Chat bubble: user messages strong on the extreme background, bot messages on the panel fill.
pub fn render_message(ui: &mut egui::Ui, m: &Message) {
    let is_user = m.is_user();
    let frame = egui::Frame::none()
        .fill(if is_user {
            ui.style().visuals.extreme_bg_color
        } else {
            ui.style().visuals.panel_fill
        })
        .stroke(egui::Stroke::new(
            1.0,
            ui.style().visuals.widgets.noninteractive.bg_stroke.color,
        ))
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(egui::Margin::same(8.0));

    let layout = if is_user {
        egui::Layout::top_down(egui::Align::Max)
    } else {
        egui::Layout::top_down(egui::Align::Min)
    };
    ui.with_layout(layout, |ui| {
        frame.show(ui, |ui| {
            if is_user {
                ui.label(egui::RichText::new(&m.text).strong());
            } else {
                ui.label(&m.text);
            }
            if let Some(ref preview) = m.image_preview {
                let size = decode_data_url(preview).map(|b| b.len()).unwrap_or(0);
                ui.label(format!("📷 imagen adjunta ({})", human_size(size)));
            }
            if let Some(ref audio) = m.audio_url {
                ui.hyperlink_to("🔊 Escuchar audio", playable_url(audio));
            }
        });
    });
}

/// Remote URLs are opened as-is; local clip paths become `file://` links.
pub fn playable_url(audio: &str) -> String {
    if audio.starts_with("http://") || audio.starts_with("https://") || audio.starts_with("file://") {
        audio.to_string()
    } else {
        format!("file://{}", audio)
    }
}

pub fn human_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.0} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Centered blocking notice with an OK button. Returns true once dismissed.
pub fn notice_window(ctx: &egui::Context, text: &str) -> bool {
    let mut dismissed = false;
    egui::Window::new("Aviso")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(8.0);
            ui.label(text);
            ui.add_space(12.0);
            if ui.button("Aceptar").clicked() {
                dismissed = true;
            }
        });
    dismissed
}

pub fn screen_title(ui: &mut egui::Ui, title: &str) {
    ui.add_space(24.0);
    ui.heading(title);
    ui.add_space(SCREEN_TITLE_BOTTOM_SPACING);
}

/// Message list filling the space above the input area.
pub fn message_list(ui: &mut egui::Ui, messages: &[Message], reserved_below: f32) {
    let height = (ui.available_height() - reserved_below).max(80.0);
    egui::ScrollArea::vertical()
        .max_height(height)
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for m in messages {
                render_message(ui, m);
                ui.add_space(8.0);
            }
        });
}
