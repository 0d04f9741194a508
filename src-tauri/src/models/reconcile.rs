//! Merges the catalog with what the model service reports as downloaded.

use log::warn;

use super::download_state::{DownloadState, DownloadStates};
use super::selector::ModelSelector;
use crate::llm::{find_model, DownloadedModel, Model};

/// A downloaded artifact that matches no catalog variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedDownload {
    pub model_id: String,
    pub parameter_size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub states: DownloadStates,
    pub orphans: Vec<OrphanedDownload>,
}

/// Split `"<modelId>:<parameterSize>"` on the first colon.
/// A name without a colon yields an empty parameter size.
fn split_record_name(name: &str) -> (&str, &str) {
    name.split_once(':').unwrap_or((name, ""))
}

/// Build a fresh download-state map from the catalog and the downloaded records.
///
/// Every matched record becomes a complete download. Records whose model or
/// variant is missing from the catalog are logged and left out.
pub fn reconcile(available: &[Model], downloaded: &[DownloadedModel]) -> Reconciliation {
    let mut result = Reconciliation::default();

    for record in downloaded {
        let (model_id, parameter_size) = split_record_name(&record.name);

        let known = find_model(available, model_id)
            .is_some_and(|model| model.has_variant(parameter_size));

        if !known {
            warn!(
                "Downloaded model {} ({}) is not in the catalog",
                model_id, parameter_size
            );
            result.orphans.push(OrphanedDownload {
                model_id: model_id.to_string(),
                parameter_size: parameter_size.to_string(),
            });
            continue;
        }

        result.states.insert(
            ModelSelector::new(model_id, parameter_size),
            DownloadState::COMPLETE,
        );
    }

    result
}

/// Flag each catalog variant that has a matching downloaded record.
pub fn mark_downloaded(mut available: Vec<Model>, downloaded: &[DownloadedModel]) -> Vec<Model> {
    for model in &mut available {
        for variant in &mut model.variants {
            let name = format!("{}:{}", model.id, variant.parameter_size);
            variant.downloaded = downloaded.iter().any(|record| record.name == name);
        }
    }
    available
}
