//! End-of-run report delivery
//!
//! Delivery happens after the run has closed. A failure here is reported in
//! the run summary and never changes the outcome of the run itself.

use serde::{Deserialize, Serialize};
use sortline_core::Error as CoreError;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Artifact {0} is missing")]
    MissingArtifact(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ReportError> for CoreError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::DeliveryFault(other.to_string()),
        }
    }
}

/// How the report leaves the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTransport {
    /// HTTP POST of a multipart form with the artifact attached
    Webhook,
    /// Only log where the artifact is
    Log,
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub transport: ReportTransport,
    /// Webhook URL, required for the webhook transport
    pub endpoint: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub retry_count: u32,
    pub timeout_seconds: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            transport: ReportTransport::Webhook,
            endpoint: None,
            recipient: String::new(),
            subject: "Coke Classification Detection Counts".to_string(),
            body: "Please find attached the detection counts sheet.".to_string(),
            retry_count: 3,
            timeout_seconds: 30,
        }
    }
}

impl ReportConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        if self.recipient.trim().is_empty() {
            return Err("Report recipient must be set when reporting is enabled".to_string());
        }

        if self.transport == ReportTransport::Webhook {
            match self.endpoint.as_deref() {
                None => return Err("Webhook endpoint must be set".to_string()),
                Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                    return Err(format!("Webhook endpoint must be an http(s) URL: {}", url));
                }
                Some(_) => {}
            }
        }

        if self.timeout_seconds == 0 {
            return Err("Report timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Delivers the finished log artifact
pub trait ReportSink: Send {
    fn deliver(&self, artifact: &Path, recipient: &str) -> Result<(), ReportError>;
}

/// Build the sink described by `config`, or none when reporting is off
pub fn build_report_sink(config: &ReportConfig) -> Result<Option<Box<dyn ReportSink>>, ReportError> {
    if !config.enabled {
        return Ok(None);
    }
    config.validate().map_err(ReportError::Config)?;

    let sink: Box<dyn ReportSink> = match config.transport {
        ReportTransport::Log => Box::new(LogReportSink),
        ReportTransport::Webhook => Box::new(WebhookReportSink::new(config)?),
    };
    Ok(Some(sink))
}

/// Logs the artifact location and succeeds
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn deliver(&self, artifact: &Path, recipient: &str) -> Result<(), ReportError> {
        if !artifact.exists() {
            return Err(ReportError::MissingArtifact(artifact.display().to_string()));
        }
        info!("Report for {} is at {}", recipient, artifact.display());
        Ok(())
    }
}

/// POSTs the artifact as a multipart form.
///
/// Fields: `recipient`, `subject`, `body`, and `attachment` holding the file.
/// The blocking HTTP client owns a private runtime, so it is only built inside
/// `deliver`, which runs on the loop's blocking thread. Construction is safe
/// from async code.
pub struct WebhookReportSink {
    timeout: Duration,
    endpoint: String,
    subject: String,
    body: String,
    retry_count: u32,
    backoff: Duration,
}

impl WebhookReportSink {
    pub fn new(config: &ReportConfig) -> Result<Self, ReportError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| ReportError::Config("Webhook endpoint must be set".to_string()))?;

        Ok(Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            endpoint,
            subject: config.subject.clone(),
            body: config.body.clone(),
            retry_count: config.retry_count,
            backoff: Duration::from_millis(100),
        })
    }

    /// Base delay between attempts; attempt `n` waits `n * backoff`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn client(&self) -> Result<reqwest::blocking::Client, ReportError> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ReportError::Delivery(format!("Failed to build HTTP client: {}", e)))
    }

    fn form(&self, artifact: &Path, recipient: &str) -> Result<reqwest::blocking::multipart::Form, ReportError> {
        reqwest::blocking::multipart::Form::new()
            .text("recipient", recipient.to_string())
            .text("subject", self.subject.clone())
            .text("body", self.body.clone())
            .file("attachment", artifact)
            .map_err(|e| ReportError::MissingArtifact(format!("{}: {}", artifact.display(), e)))
    }
}

impl ReportSink for WebhookReportSink {
    fn deliver(&self, artifact: &Path, recipient: &str) -> Result<(), ReportError> {
        let client = self.client()?;
        let mut last_error = None;

        for attempt in 0..=self.retry_count {
            // Multipart bodies cannot be cloned, so each attempt rebuilds the form
            let form = self.form(artifact, recipient)?;
            match client.post(&self.endpoint).multipart(form).send() {
                Ok(response) if response.status().is_success() => {
                    info!("Report delivered to {} via {}", recipient, self.endpoint);
                    return Ok(());
                }
                Ok(response) => {
                    last_error = Some(format!("HTTP {}", response.status().as_u16()));
                }
                Err(e) => {
                    last_error = Some(format!("Request error: {}", e));
                }
            }

            if attempt < self.retry_count {
                warn!("Report delivery attempt {} failed: {:?}", attempt + 1, last_error);
                std::thread::sleep(self.backoff * (attempt + 1));
            }
        }

        let reason = last_error.unwrap_or_else(|| "no attempt made".to_string());
        error!("Report delivery failed after {} retries: {}", self.retry_count, reason);
        Err(ReportError::Delivery(reason))
    }
}
