// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tokio::sync::Mutex as TokioMutex;
use tokio::time::Duration;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use collector_agent::{
    collector::CollectorAgent, config, forwarder::HttpEventForwarder, metrics::MetricsRegistry,
    store::EventStore,
};

const STORE_OPEN_ATTEMPTS: u32 = 10;
const STORE_OPEN_RETRY_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOG_AGENT_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Starting log collector agent");

    let config = match config::Config::new() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Error creating config on log collector startup: {e}");
            return;
        }
    };

    // the event store may live on storage that is still coming up when the
    // agent starts, so bound the wait instead of failing immediately
    let mut store = None;
    for attempt in 1..=STORE_OPEN_ATTEMPTS {
        match EventStore::open(&config.db_path) {
            Ok(s) => {
                store = Some(s);
                break;
            }
            Err(e) => {
                error!(
                    "Waiting for event store at {} ({attempt}/{STORE_OPEN_ATTEMPTS}): {e}",
                    config.db_path.display()
                );
                tokio::time::sleep(STORE_OPEN_RETRY_DELAY).await;
            }
        }
    }
    let Some(store) = store else {
        error!("Event store unavailable, shutting down log collector");
        return;
    };

    let metrics = Arc::new(MetricsRegistry::new());
    let forwarder = Arc::new(HttpEventForwarder::new(Arc::clone(&config)));

    let agent = CollectorAgent {
        config,
        store: Arc::new(TokioMutex::new(store)),
        metrics,
        forwarder,
    };

    if let Err(e) = agent.start().await {
        error!("Error when starting log collector agent: {e:?}");
    }
}
