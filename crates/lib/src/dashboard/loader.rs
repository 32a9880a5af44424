//! Dashboard loader: one fetch on mount, then exactly one of loading / error / loaded.

use super::client::{DashboardClient, DashboardError};
use super::model::DashboardData;
use crate::guard::{RequestGuard, Ticket};

pub const LOADING_TEXT: &str = "⏳ Cargando datos...";
pub const LOAD_ERROR_TEXT: &str = "No se pudieron cargar los datos. Intenta de nuevo más tarde.";
pub const TITLE: &str = "📊 Dashboard Universidad";

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Error(String),
    Loaded(Box<DashboardData>),
}

/// The single fetch issued on mount.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub ticket: Ticket,
    pub level: String,
}

impl FetchJob {
    pub async fn run(&self, client: &DashboardClient) -> Result<DashboardData, DashboardError> {
        client.fetch(&self.level).await
    }
}

pub struct DashboardLoader {
    state: LoadState,
    guard: RequestGuard,
}

impl DashboardLoader {
    /// Mount in the loading state and hand back the fetch to run. There is no retry or refresh.
    pub fn mount(level: impl Into<String>) -> (Self, Option<FetchJob>) {
        let mut guard = RequestGuard::new();
        let job = guard.begin().map(|ticket| FetchJob {
            ticket,
            level: level.into(),
        });
        (
            Self {
                state: LoadState::Loading,
                guard,
            },
            job,
        )
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn data(&self) -> Option<&DashboardData> {
        match &self.state {
            LoadState::Loaded(d) => Some(d),
            _ => None,
        }
    }

    pub fn complete(&mut self, ticket: Ticket, result: Result<DashboardData, DashboardError>) -> bool {
        if !self.guard.finish(ticket) {
            log::debug!("dropping stale dashboard result");
            return false;
        }
        self.state = match result {
            Ok(data) => LoadState::Loaded(Box::new(data)),
            Err(e) => {
                log::error!("loading dashboard: {}", e);
                LoadState::Error(LOAD_ERROR_TEXT.to_string())
            }
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_is_loading_with_one_job() {
        let (loader, job) = DashboardLoader::mount("universidad");
        assert_eq!(loader.state(), &LoadState::Loading);
        assert_eq!(job.unwrap().level, "universidad");
        assert!(loader.data().is_none());
    }

    #[test]
    fn error_shows_fixed_text_and_no_data() {
        let (mut loader, job) = DashboardLoader::mount("universidad");
        let job = job.unwrap();
        assert!(loader.complete(job.ticket, Err(DashboardError::Api("500 Internal Server Error".into()))));
        assert_eq!(loader.state(), &LoadState::Error(LOAD_ERROR_TEXT.to_string()));
        assert!(loader.data().is_none());
    }

    #[test]
    fn success_is_loaded() {
        let (mut loader, job) = DashboardLoader::mount("universidad");
        loader.complete(job.unwrap().ticket, Ok(DashboardData::default()));
        assert!(matches!(loader.state(), LoadState::Loaded(_)));
    }

    #[test]
    fn second_completion_is_ignored() {
        let (mut loader, job) = DashboardLoader::mount("universidad");
        let ticket = job.unwrap().ticket;
        assert!(loader.complete(ticket, Ok(DashboardData::default())));
        assert!(!loader.complete(ticket, Err(DashboardError::Api("late".into()))));
        assert!(matches!(loader.state(), LoadState::Loaded(_)));
    }
}
