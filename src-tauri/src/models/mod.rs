mod download_state;
mod health;
mod reconcile;
mod selector;
mod store;

pub use download_state::{DownloadState, DownloadStates};
pub use health::{HealthIntervals, HealthMonitor, HealthProbe};
pub use reconcile::{mark_downloaded, reconcile, OrphanedDownload, Reconciliation};
pub use selector::{ModelSelector, SelectorError};
pub use store::{ActiveModelListener, ActiveModelOption, ModelError, ModelStore};
