use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog shipped with the app, used when no catalog file is configured.
pub const BUNDLED_CATALOG: &str = include_str!("../../resources/llm/available_models.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read available models file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse available models JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing 'models' key")]
    MissingModelsKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAuthor {
    pub name: String,
    pub url: String,
}

/// A parameter-size build of a model, e.g. the `7b` build of Llama.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVariant {
    pub parameter_size: String,
    /// Display string, e.g. "4.1GB"
    pub disk_space: String,
    /// Only filled in by `list_models`; the catalog file itself never sets it.
    #[serde(default)]
    pub downloaded: bool,
}

/// A catalog entry. Read-only for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: ModelAuthor,
    pub variants: Vec<ModelVariant>,
}

impl Model {
    pub fn variant(&self, parameter_size: &str) -> Option<&ModelVariant> {
        self.variants
            .iter()
            .find(|v| v.parameter_size == parameter_size)
    }

    pub fn has_variant(&self, parameter_size: &str) -> bool {
        self.variant(parameter_size).is_some()
    }

    /// Parse a catalog document of the form `{"models": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Vec<Model>, CatalogError> {
        let json: serde_json::Value = serde_json::from_str(json)?;
        let models = json.get("models").ok_or(CatalogError::MissingModelsKey)?;

        Ok(Vec::<Model>::deserialize(models)?)
    }

    pub async fn from_json(path: &Path) -> Result<Vec<Model>, CatalogError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }
}

/// Find the catalog entry owning `model_id`, if any.
pub fn find_model<'a>(catalog: &'a [Model], model_id: &str) -> Option<&'a Model> {
    catalog.iter().find(|m| m.id == model_id)
}

/// Where the available-models catalog is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Bundled,
    File(PathBuf),
}

impl CatalogSource {
    pub async fn load(&self) -> Result<Vec<Model>, CatalogError> {
        match self {
            CatalogSource::Bundled => Model::from_json_str(BUNDLED_CATALOG),
            CatalogSource::File(path) => Model::from_json(path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::NamedTempFile;

    fn create_test_file(json: &str) -> NamedTempFile {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(&temp_file, json).unwrap();
        temp_file
    }

    #[tokio::test]
    async fn test_parses_valid_json_successfully() {
        let json = r#"{
            "models": [{
                "id": "llama2",
                "name": "Llama 2",
                "description": "A test model",
                "author": {
                    "name": "Meta",
                    "url": "https://meta.com"
                },
                "variants": [{
                    "parameter_size": "7b",
                    "disk_space": "4.1GB"
                }]
            }]
        }"#;

        let temp_file = create_test_file(json);
        let models = Model::from_json(temp_file.path()).await.unwrap();

        assert_eq!(models.len(), 1);
        let model = &models[0];
        assert_eq!(model.id, "llama2");
        assert_eq!(model.author.name, "Meta");
        assert!(model.has_variant("7b"));
        assert!(!model.has_variant("13b"));
        assert!(!model.variants[0].downloaded);
    }

    #[tokio::test]
    async fn test_returns_error_when_models_key_missing() {
        let temp_file = create_test_file(r#"{ "wrong_key": [] }"#);
        let result = Model::from_json(temp_file.path()).await;

        assert!(matches!(result, Err(CatalogError::MissingModelsKey)));
    }

    #[tokio::test]
    async fn test_returns_error_for_malformed_json() {
        let temp_file = create_test_file(r#"{ "models": [ { "id": 3 } ] }"#);
        let result = Model::from_json(temp_file.path()).await;

        assert!(matches!(result, Err(CatalogError::Parse(_))));
    }

    #[tokio::test]
    async fn test_returns_error_for_nonexistent_file() {
        let result = Model::from_json(Path::new("nonexistent.json")).await;

        let err = result.unwrap_err();
        assert!(matches!(err, CatalogError::Read(_)));
        assert!(err
            .to_string()
            .contains("Failed to read available models file"));
    }

    #[tokio::test]
    async fn test_bundled_catalog_is_valid() {
        let models = CatalogSource::Bundled.load().await.unwrap();

        assert!(!models.is_empty());
        let ids: HashSet<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), models.len(), "model ids must be unique");
        for model in &models {
            assert!(!model.variants.is_empty(), "{} has no variants", model.id);
            assert!(!model.id.contains(':'), "{} contains a colon", model.id);
        }
    }

    #[tokio::test]
    async fn test_file_source_reads_given_path() {
        let temp_file = create_test_file(r#"{ "models": [] }"#);
        let source = CatalogSource::File(temp_file.path().to_path_buf());

        assert!(source.load().await.unwrap().is_empty());
    }
}
