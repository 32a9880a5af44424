//! IPETH Desktop: application entry.

mod app;
mod dashboard_view;
mod transcription_view;
mod tutor_view;
mod widgets;
mod worker;

use eframe::egui;

fn main() -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([760.0, 520.0]),
        ..Default::default()
    };
    eframe::run_native(
        "IPETH",
        options,
        Box::new(|cc| Box::new(app::IpethApp::new(cc))),
    )
}
