//! Model service health polling.
//!
//! The probe runs on a self-rescheduling timer: a short interval while the
//! service is unreachable, a longer one once it is up. The catalog is
//! refreshed each time the service comes up.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::store::ModelStore;
use crate::llm::{Backend, OllamaProbe};

pub trait HealthProbe: Send + Sync + 'static {
    fn is_running(&self) -> impl Future<Output = bool> + Send;
}

impl HealthProbe for OllamaProbe {
    async fn is_running(&self) -> bool {
        OllamaProbe::is_running(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthIntervals {
    pub offline: Duration,
    pub online: Duration,
}

impl Default for HealthIntervals {
    fn default() -> Self {
        Self {
            offline: Duration::from_secs(10),
            online: Duration::from_secs(60),
        }
    }
}

impl HealthIntervals {
    /// Delay before the next probe, given the last observed health.
    pub fn next(&self, running: bool) -> Duration {
        if running {
            self.online
        } else {
            self.offline
        }
    }
}

pub struct HealthMonitor<P, B> {
    probe: Arc<P>,
    store: Arc<ModelStore<B>>,
    intervals: HealthIntervals,
}

impl<P: HealthProbe, B: Backend> HealthMonitor<P, B> {
    pub fn new(probe: Arc<P>, store: Arc<ModelStore<B>>, intervals: HealthIntervals) -> Self {
        Self {
            probe,
            store,
            intervals,
        }
    }

    /// Probe once and return how long to wait before the next probe.
    pub async fn tick(&self) -> Duration {
        let running = self.probe.is_running().await;
        let was_running = self.store.set_service_running(running);

        if running != was_running {
            if running {
                info!("Model service is running");
                if let Err(e) = self.store.refresh().await {
                    warn!("Refresh after model service came up failed: {}", e);
                }
            } else {
                warn!("Model service is not reachable");
            }
        }

        self.intervals.next(running)
    }

    /// Poll until `token` is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let delay = self.tick().await;
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            info!("Health monitor stopped");
        })
    }
}
