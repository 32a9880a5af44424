//! Dashboard screen: tables built from the fetched summary.

use crate::worker::{self, Poll};
use eframe::egui;
use lib::dashboard::loader::{LOADING_TEXT, TITLE};
use lib::dashboard::model::{format_number, format_percent, format_timestamp, CountRow};
use lib::dashboard::{DashboardClient, DashboardData, DashboardError, DashboardLoader, LoadState};
use lib::guard::Ticket;
use std::sync::mpsc;

pub struct DashboardView {
    loader: DashboardLoader,
    pending: Option<(Ticket, mpsc::Receiver<Result<DashboardData, DashboardError>>)>,
}

impl DashboardView {
    /// Mount and start the single fetch.
    pub fn new(client: DashboardClient, level: String) -> Self {
        let (loader, job) = DashboardLoader::mount(level);
        let pending = job.map(|job| {
            let ticket = job.ticket;
            let rx = worker::run_in_background(move |rt| rt.block_on(job.run(&client)));
            (ticket, rx)
        });
        Self { loader, pending }
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
                self.loader.complete(ticket, result);
            }
            Poll::Lost => {
                self.pending = None;
                self.loader
                    .complete(ticket, Err(DashboardError::Api("request worker stopped".to_string())));
            }
        }
    }

    pub fn ui(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        match self.loader.state() {
            LoadState::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(LOADING_TEXT);
                });
            }
            LoadState::Error(text) => {
                ui.label(text);
            }
            LoadState::Loaded(data) => {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| render(ui, data));
            }
        }
    }
}

fn render(ui: &mut egui::Ui, data: &DashboardData) {
    const SECTION_SPACING: f32 = 18.0;
    let summary = &data.summary;
    let perf = &summary.performance_distribution;

    ui.heading(TITLE);
    ui.add_space(SECTION_SPACING);
    ui.horizontal(|ui| {
        ui.label("Total estudiantes:");
        ui.label(egui::RichText::new(format_number(summary.total_students)).strong());
    });
    ui.label(format!(
        "🔴 Alto: {} | 🟠 Medio: {} | 🟢 Bajo: {}",
        format_number(perf.alto),
        format_number(perf.medio),
        format_number(perf.bajo)
    ));

    ui.add_space(SECTION_SPACING);
    ui.strong("📚 Distribución por semestre");
    count_table(ui, "semester_table", "Semestre", &summary.semester_rows());

    ui.add_space(SECTION_SPACING);
    ui.strong("🎓 Distribución por programa");
    count_table(ui, "program_table", "Programa", &summary.program_rows());

    ui.add_space(SECTION_SPACING);
    ui.strong("📈 Tendencias (Semanas 9-12)");
    egui::Grid::new("trends_table")
        .striped(true)
        .num_columns(5)
        .spacing([24.0, 6.0])
        .show(ui, |ui| {
            for h in ["Semana", "Nota Promedio", "Asistencia", "Tareas", "Estudiantes"] {
                ui.strong(h);
            }
            ui.end_row();
            for t in &data.trends {
                ui.label(t.week_label());
                ui.label(format_number(t.avg_grade));
                ui.label(format_percent(t.avg_attendance));
                ui.label(format_number(t.avg_assignments));
                ui.label(format_number(t.student_count));
                ui.end_row();
            }
        });

    let risk = data.risk_rows();
    if !risk.is_empty() {
        ui.add_space(SECTION_SPACING);
        ui.strong("⚠️ Riesgo");
        egui::Grid::new("risk_table")
            .striped(true)
            .num_columns(2)
            .spacing([24.0, 6.0])
            .show(ui, |ui| {
                for row in &risk {
                    ui.label(&row.label);
                    ui.label(&row.value);
                    ui.end_row();
                }
            });
    }

    ui.add_space(SECTION_SPACING);
    ui.label(format!(
        "Última actualización: {}",
        format_timestamp(&data.metadata.last_updated)
    ));
    ui.label(format!("Período: {}", data.metadata.analysis_period));
    ui.add_space(SECTION_SPACING);
}

fn count_table(ui: &mut egui::Ui, id: &str, first_header: &str, rows: &[CountRow]) {
    egui::Grid::new(id)
        .striped(true)
        .num_columns(2)
        .spacing([24.0, 6.0])
        .show(ui, |ui| {
            ui.strong(first_header);
            ui.strong("Estudiantes");
            ui.end_row();
            for row in rows {
                ui.label(&row.label);
                ui.label(format_number(row.count));
                ui.end_row();
            }
        });
}
