//! One-shot sensor notification to the backend

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use rover_shared::now_secs_f64;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Event type name registered on the backend for obstacle readings
pub const ULTRASONIC_EVENT_TYPE: &str = "Ultrasonic";

/// Query parameters of an event report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReport {
    pub description: String,
    pub raw_timestamp: f64,
    pub event_type: String,
}

impl SensorReport {
    /// Report for an obstacle seen by the sensor right now
    pub fn obstacle(device_id: &str) -> Self {
        Self {
            description: format!("{} detected an obstacle", device_id),
            raw_timestamp: now_secs_f64(),
            event_type: ULTRASONIC_EVENT_TYPE.into(),
        }
    }

    /// Short text form pushed to remote operators over the message channel
    pub fn summary(&self) -> String {
        format!("{}: {}", self.event_type, self.description)
    }
}

/// Fire-and-forget request to the backend
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Issue the request and return the response status code
    async fn notify(&self, report: &SensorReport) -> Result<u16>;
}

/// Notifier posting reports to the backend's events endpoint
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(host: &str, port: u16, path: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: format!("http://{}:{}{}", host, port, path),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, report: &SensorReport) -> Result<u16> {
        debug!("[NOTIFY] POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .query(report)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?;
        Ok(response.status().as_u16())
    }
}
