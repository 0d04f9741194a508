//! Where the local Ollama service listens, and whether it is up.

use std::time::Duration;

use log::debug;
use ollama_rs::Ollama;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// The probe must answer quickly or the service counts as down.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid Ollama URL {url}: {reason}")]
    Invalid { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaEndpoint {
    url: Url,
    host: String,
    port: u16,
}

impl OllamaEndpoint {
    /// Parse a base URL such as `http://localhost:11434`.
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let invalid = |reason: &str| EndpointError::Invalid {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        let host = parsed
            .host_str()
            .map(|host| format!("{}://{}", parsed.scheme(), host))
            .ok_or_else(|| invalid("missing host"))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(Self {
            url: parsed,
            host,
            port,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn client(&self) -> Ollama {
        Ollama::new(self.host.clone(), self.port)
    }
}

/// Liveness check against the Ollama root route, which answers `200 OK`
/// with "Ollama is running".
#[derive(Debug, Clone)]
pub struct OllamaProbe {
    endpoint: OllamaEndpoint,
    http: Client,
}

impl OllamaProbe {
    pub fn new(endpoint: OllamaEndpoint) -> Self {
        Self {
            endpoint,
            http: Client::new(),
        }
    }

    pub async fn is_running(&self) -> bool {
        let request = self
            .http
            .get(self.endpoint.url().clone())
            .timeout(PROBE_TIMEOUT);

        match request.send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Ollama health probe failed: {}", e);
                false
            }
        }
    }
}
