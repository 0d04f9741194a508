use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::selector::ModelSelector;

/// Download status of a single variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadState {
    pub downloaded: bool,
    /// 0-100
    pub progress: u8,
}

impl DownloadState {
    pub const STARTED: Self = Self {
        downloaded: false,
        progress: 0,
    };

    pub const COMPLETE: Self = Self {
        downloaded: true,
        progress: 100,
    };

    /// State implied by a live progress report.
    pub fn from_progress(progress: u8) -> Self {
        let progress = progress.min(100);
        Self {
            downloaded: progress == 100,
            progress,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        !self.downloaded
    }
}

/// Per-variant download states, keyed by `modelId:parameterSize`.
pub type DownloadStates = BTreeMap<ModelSelector, DownloadState>;
