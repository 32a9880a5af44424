//! Top-level navigation: which panel (if any) is mounted.

use std::fmt;

pub const WELCOME_TITLE: &str = "¡Comencemos!";
pub const WELCOME_HINT: &str = "Selecciona una de las opciones que se muestra en la barra lateral.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Transcription,
    Tutor,
    Dashboard,
}

impl Panel {
    pub const ALL: [Panel; 3] = [Panel::Transcription, Panel::Tutor, Panel::Dashboard];

    pub fn title(&self) -> &'static str {
        match self {
            Panel::Transcription => "Transcripción",
            Panel::Tutor => "Tutor",
            Panel::Dashboard => "Dashboard",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// What `Shell::select` asks the front-end to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same panel re-selected; keep its state.
    Unchanged,
    /// Drop the old panel's state (if any) and mount `Panel` fresh.
    Mount(Panel),
}

#[derive(Debug, Default)]
pub struct Shell {
    selected: Option<Panel>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    /// None shows the welcome screen.
    pub fn selected(&self) -> Option<Panel> {
        self.selected
    }

    pub fn select(&mut self, panel: Panel) -> Transition {
        if self.selected == Some(panel) {
            return Transition::Unchanged;
        }
        log::debug!("mounting panel {}", panel);
        self.selected = Some(panel);
        Transition::Mount(panel)
    }

    /// Back to the welcome screen, unmounting the current panel.
    pub fn deselect(&mut self) {
        self.selected = None;
    }
}
