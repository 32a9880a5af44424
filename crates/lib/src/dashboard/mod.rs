//! Analytics dashboard: client, lenient summary model, loader state.

pub mod client;
pub mod loader;
pub mod model;

pub use client::{DashboardClient, DashboardError};
pub use loader::{DashboardLoader, FetchJob, LoadState};
pub use model::{CountRow, DashboardData, RiskRow};
