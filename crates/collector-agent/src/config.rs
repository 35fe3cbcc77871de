// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Categories that get a dedicated persistor service. Events in any other
/// category are still stored, counted and sent to HEC, but have no persistor
/// to route to.
pub const PERSISTOR_CATEGORIES: [&str; 4] = ["auth", "payment", "system", "application"];

const DEFAULT_RECEIVER_HOST: &str = "0.0.0.0";
const DEFAULT_RECEIVER_PORT: u16 = 5002;
const DEFAULT_DB_PATH: &str = "logs.db";
const DEFAULT_HEC_URL: &str = "http://splunk:8088/services/collector";
const DEFAULT_HEC_TOKEN: &str = "splunk-token";

/// The HEC (HTTP Event Collector) endpoint events are forwarded to.
#[derive(Debug, Clone)]
pub struct HecEndpoint {
    pub url: String,
    pub token: String,
}

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Base URL of the downstream persistor service, per category.
    pub persistors: HashMap<String, String>,
    pub hec: HecEndpoint,
    pub max_request_content_length: usize,
    /// Timeout for each outbound forward request, in seconds.
    pub forward_timeout_secs: u64,
}

impl Config {
    pub fn new() -> Result<Config, Box<dyn std::error::Error>> {
        let host = env::var("LOG_AGENT_HOST").unwrap_or_else(|_| DEFAULT_RECEIVER_HOST.to_string());
        let port: u16 = match env::var("LOG_AGENT_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("Invalid LOG_AGENT_PORT value: {raw}"))?,
            Err(_) => DEFAULT_RECEIVER_PORT,
        };
        let db_path = env::var("LOG_AGENT_DB_PATH")
            .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
            .into();

        let mut persistors = HashMap::new();
        for category in PERSISTOR_CATEGORIES {
            let env_key = format!("PERSISTOR_{}", category.to_uppercase());
            let url = env::var(&env_key)
                .unwrap_or_else(|_| format!("http://persistor-{category}:6000"));
            persistors.insert(category.to_string(), url);
        }

        let hec = HecEndpoint {
            url: env::var("SPLUNK_HEC").unwrap_or_else(|_| DEFAULT_HEC_URL.to_string()),
            token: env::var("SPLUNK_TOKEN").unwrap_or_else(|_| DEFAULT_HEC_TOKEN.to_string()),
        };

        Ok(Config {
            host,
            port,
            db_path,
            persistors,
            hec,
            max_request_content_length: 10 * 1024 * 1024, // 10MB in Bytes
            forward_timeout_secs: 3,
        })
    }
}
