use crate::commentary::{CommentaryGenerator, GenerationError, GenerationSettings};
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::llm::types::*;
use crate::prompts::with_system_prompt;
use log::{debug, error};
use reqwest::blocking::Client;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Blocking client for a local Ollama-compatible `/api/generate` endpoint.
/// One request per call, no retries.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    settings: GenerationSettings,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(settings: GenerationSettings) -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT, settings, 120)
    }

    /// Fails only when the HTTP client itself cannot be built.
    pub fn with_endpoint(
        base_url: &str,
        settings: GenerationSettings,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ReportError::Config(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        Self::with_endpoint(
            &config.endpoint,
            GenerationSettings::from_config(config),
            config.request_timeout_secs,
        )
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    fn build_request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: self.settings.model.clone(),
            prompt: with_system_prompt(prompt),
            stream: false,
            options: GenerateOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout_secs)
        } else if err.is_decode() {
            GenerationError::InvalidResponse(err.to_string())
        } else {
            GenerationError::Connection(err.to_string())
        }
    }
}

impl CommentaryGenerator for OllamaClient {
    fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let payload = self.build_request(prompt);
        debug!(
            "Requesting commentary from {} (model {}, {} prompt chars)",
            url,
            payload.model,
            payload.prompt.len()
        );

        let outcome = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| self.map_transport_error(e))
            .and_then(|res| {
                let status = res.status();
                if !status.is_success() {
                    let body = res.text().unwrap_or_default();
                    return Err(GenerationError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                res.json::<GenerateResponse>()
                    .map_err(|e| self.map_transport_error(e))
            })
            .and_then(|body| {
                let text = body.response.trim().to_string();
                if text.is_empty() {
                    Err(GenerationError::EmptyResponse)
                } else {
                    Ok(text)
                }
            });

        if let Err(e) = &outcome {
            error!("Error querying LLM: {}", e);
            eprintln!("Error querying LLM: {}", e);
        }
        outcome
    }
}
