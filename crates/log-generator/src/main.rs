// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use std::env;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tokio::time::interval;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_COLLECTOR_URL: &str = "http://log-collector:5002/collect";
const DEFAULT_CLIENT_NAME: &str = "log-generator";
const DEFAULT_INTERVAL_SECS: f64 = 1.0;

const LEVELS: [&str; 4] = ["ERROR", "WARNING", "INFO", "DEBUG"];
const CATEGORIES: [&str; 4] = ["auth", "payment", "system", "application"];
const MESSAGES: [&str; 10] = [
    "User login succeeded",
    "User login failed",
    "Payment processed",
    "Payment declined",
    "System timeout",
    "Cache refreshed",
    "Debugging request",
    "Service started",
    "Service stopped",
    "Configuration updated",
];

struct GeneratorConfig {
    collector_url: String,
    client_name: String,
    interval: Duration,
}

impl GeneratorConfig {
    fn from_env() -> Self {
        let interval_secs = env::var("GEN_INTERVAL_SECS")
            .ok()
            .and_then(|val| val.parse::<f64>().ok())
            .filter(|secs| *secs > 0.0)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        GeneratorConfig {
            collector_url: env::var("COLLECTOR_URL")
                .unwrap_or_else(|_| DEFAULT_COLLECTOR_URL.to_string()),
            client_name: env::var("CLIENT_NAME")
                .unwrap_or_else(|_| DEFAULT_CLIENT_NAME.to_string()),
            interval: Duration::from_secs_f64(interval_secs),
        }
    }
}

fn generate_event(client_name: &str) -> Value {
    let mut rng = rand::thread_rng();
    json!({
        "event_id": Uuid::new_v4().to_string(),
        "level": LEVELS.choose(&mut rng).copied().unwrap_or("INFO"),
        "message": MESSAGES.choose(&mut rng).copied().unwrap_or(MESSAGES[0]),
        "type": CATEGORIES.choose(&mut rng).copied().unwrap_or("application"),
        "client_name": client_name,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    })
}

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOG_GENERATOR_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(format!("hyper=off,rustls=off,{log_level}"))
                .expect("could not parse log level in configuration"),
        )
        .without_time()
        .finish();
    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = GeneratorConfig::from_env();
    info!(
        "Log generator started: sending to {} as client {}",
        config.collector_url, config.client_name
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|e| {
            error!("Unable to build HTTP client: {e}, using defaults");
            reqwest::Client::new()
        });

    let mut tick = interval(config.interval);
    loop {
        tick.tick().await;
        let event = generate_event(&config.client_name);

        match client.post(&config.collector_url).json(&event).send().await {
            Ok(response) => {
                info!(
                    "sent {} {} -> {}",
                    event["event_id"].as_str().unwrap_or("").chars().take(6).collect::<String>(),
                    event["level"].as_str().unwrap_or(""),
                    response.status()
                );
            }
            Err(e) => {
                error!("send error: {e}");
            }
        }
    }
}
