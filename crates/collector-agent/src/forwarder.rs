// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error};

use crate::config::Config;

/// An accepted event queued for delivery to the downstream sinks. Carries
/// the original payload so downstream systems see exactly what the client
/// sent.
pub struct ForwardRequest {
    pub category: String,
    pub payload: Value,
}

#[async_trait]
pub trait EventForwarder {
    /// Drains the channel of accepted events, forwarding each one as it
    /// arrives.
    async fn start_forwarder(&self, rx: Receiver<ForwardRequest>);

    /// Sends one event to the category persistor and the HEC collector.
    /// Both sends are best effort: a single attempt each, failures logged
    /// and dropped, and one sink failing never skips the other.
    async fn forward(&self, request: ForwardRequest);
}

pub struct HttpEventForwarder {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl HttpEventForwarder {
    pub fn new(config: Arc<Config>) -> Self {
        let timeout = Duration::from_secs(config.forward_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                error!("Unable to build forwarding client: {e}, using defaults");
                reqwest::Client::new()
            });
        HttpEventForwarder { config, client }
    }

    async fn send_to_persistor(&self, request: &ForwardRequest) {
        let Some(base_url) = self.config.persistors.get(request.category.as_str()) else {
            debug!(
                "No persistor configured for category {}, skipping",
                request.category
            );
            return;
        };
        let url = format!("{base_url}/store");

        match self.client.post(&url).json(&request.payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Forwarded event to {} persistor", request.category);
            }
            Ok(response) => {
                error!(
                    "Persistor {url} returned status {}",
                    response.status()
                );
            }
            Err(e) => {
                error!(
                    "Failed to forward to {} persistor: {e}",
                    request.category
                );
            }
        }
    }

    async fn send_to_hec(&self, request: &ForwardRequest) {
        let hec = &self.config.hec;
        let body = serde_json::json!({ "event": request.payload });

        match self
            .client
            .post(&hec.url)
            .header("Authorization", format!("Splunk {}", hec.token))
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!("Forwarded event to HEC collector");
            }
            Ok(response) => {
                error!("HEC collector returned status {}", response.status());
            }
            Err(e) => {
                error!("Failed to send event to HEC collector: {e}");
            }
        }
    }
}

#[async_trait]
impl EventForwarder for HttpEventForwarder {
    async fn start_forwarder(&self, mut rx: Receiver<ForwardRequest>) {
        while let Some(request) = rx.recv().await {
            self.forward(request).await;
        }
    }

    async fn forward(&self, request: ForwardRequest) {
        self.send_to_persistor(&request).await;
        self.send_to_hec(&request).await;
    }
}
