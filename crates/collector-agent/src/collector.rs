// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{http, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::config::Config;
use crate::event::LogEvent;
use crate::forwarder::{EventForwarder, ForwardRequest};
use crate::http_utils::{
    create_response, log_and_create_http_response, verify_request_content_length, Body,
    HttpResponse,
};
use crate::metrics::{MetricsRegistry, PROMETHEUS_CONTENT_TYPE};
use crate::store::EventStore;

const COLLECT_ENDPOINT_PATH: &str = "/collect";
const LOGS_ENDPOINT_PATH: &str = "/logs";
const ANALYZE_ENDPOINT_PATH: &str = "/analyze";
const METRICS_ENDPOINT_PATH: &str = "/metrics";
const HEALTH_ENDPOINT_PATH: &str = "/health";

const FORWARD_CHANNEL_BUFFER_SIZE: usize = 10;
const DEFAULT_LOGS_LIMIT: usize = 500;
const MAX_LOGS_LIMIT: usize = 10_000;

pub struct CollectorAgent {
    pub config: Arc<Config>,
    pub store: Arc<Mutex<EventStore>>,
    pub metrics: Arc<MetricsRegistry>,
    pub forwarder: Arc<dyn EventForwarder + Send + Sync>,
}

impl CollectorAgent {
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        // setup a channel to hand accepted events to the forwarder. tx is
        // passed through the collect handler, which uses it to enqueue each
        // event for best-effort delivery to the downstream sinks.
        let (forward_tx, forward_rx): (Sender<ForwardRequest>, Receiver<ForwardRequest>) =
            mpsc::channel(FORWARD_CHANNEL_BUFFER_SIZE);

        let forwarder = self.forwarder.clone();
        let forwarder_handle = tokio::spawn(async move {
            forwarder.start_forwarder(forward_rx).await;
        });

        // setup our hyper http server, where the endpoint_handler handles
        // incoming requests
        let store = self.store.clone();
        let metrics = self.metrics.clone();
        let endpoint_config = self.config.clone();

        let service = service_fn(move |req| {
            // called for each http request
            let store = store.clone();
            let metrics = metrics.clone();
            let forward_tx = forward_tx.clone();
            let endpoint_config = endpoint_config.clone();

            CollectorAgent::endpoint_handler(endpoint_config, req, store, metrics, forward_tx)
        });

        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        debug!(
            "Collector agent started: listening on {}:{}",
            self.config.host, self.config.port
        );

        Self::serve_tcp(listener, service, forwarder_handle).await
    }

    async fn serve_tcp<S>(
        listener: tokio::net::TcpListener,
        service: S,
        mut forwarder_handle: tokio::task::JoinHandle<()>,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        S: hyper::service::Service<Request<Incoming>, Response = Response<Body>>
            + Clone
            + Send
            + 'static,
        S::Future: Send,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let server = hyper::server::conn::http1::Builder::new();
        let mut joinset = tokio::task::JoinSet::new();

        loop {
            let conn = tokio::select! {
                con_res = listener.accept() => match con_res {
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionAborted
                                | io::ErrorKind::ConnectionReset
                                | io::ErrorKind::ConnectionRefused
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Server error: {e}");
                        return Err(e.into());
                    }
                    Ok((conn, _)) => conn,
                },
                finished = async {
                    match joinset.join_next().await {
                        Some(finished) => finished,
                        None => std::future::pending().await,
                    }
                } => match finished {
                    Err(e) if e.is_panic() => {
                        // Don't kill server on panic - log and continue
                        error!("Connection handler panicked: {:?}", e);
                        continue;
                    },
                    Ok(()) | Err(_) => continue,
                },
                result = &mut forwarder_handle => {
                    error!("Forwarder task died: {:?}", result);
                    return Err("Forwarder task terminated unexpectedly".into());
                },
            };
            let conn = hyper_util::rt::TokioIo::new(conn);
            let server = server.clone();
            let service = service.clone();
            joinset.spawn(async move {
                if let Err(e) = server.serve_connection(conn, service).await {
                    error!("Connection error: {e}");
                }
            });
        }
    }

    async fn endpoint_handler(
        config: Arc<Config>,
        req: Request<Incoming>,
        store: Arc<Mutex<EventStore>>,
        metrics: Arc<MetricsRegistry>,
        forward_tx: Sender<ForwardRequest>,
    ) -> http::Result<HttpResponse> {
        match (req.method(), req.uri().path()) {
            (&Method::POST, COLLECT_ENDPOINT_PATH) => {
                Self::collect_handler(config, req, store, metrics, forward_tx).await
            }
            (&Method::GET, LOGS_ENDPOINT_PATH) => {
                let query = req.uri().query().map(str::to_string);
                Self::logs_handler(store, query.as_deref()).await
            }
            (&Method::GET, ANALYZE_ENDPOINT_PATH) => Self::analyze_handler(store).await,
            (&Method::GET, METRICS_ENDPOINT_PATH) => create_response(
                metrics.render(),
                PROMETHEUS_CONTENT_TYPE,
                StatusCode::OK,
            ),
            (&Method::GET, HEALTH_ENDPOINT_PATH) => create_response(
                json!({"status": "ok"}).to_string(),
                "application/json",
                StatusCode::OK,
            ),
            _ => {
                let mut not_found = Response::default();
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                Ok(not_found)
            }
        }
    }

    /// Accepts a JSON log event: normalize, persist with dedup, count,
    /// enqueue for forwarding. Forwarding is decoupled from the response;
    /// a full forward queue never fails the ingest.
    async fn collect_handler(
        config: Arc<Config>,
        req: Request<Incoming>,
        store: Arc<Mutex<EventStore>>,
        metrics: Arc<MetricsRegistry>,
        forward_tx: Sender<ForwardRequest>,
    ) -> http::Result<HttpResponse> {
        let (parts, body) = req.into_parts();
        if let Some(response) = verify_request_content_length(
            &parts.headers,
            config.max_request_content_length,
            "Error processing log event",
        ) {
            return response;
        }

        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                return log_and_create_http_response(
                    &format!("Error reading log event body: {e}"),
                    StatusCode::BAD_REQUEST,
                );
            }
        };

        let payload: Value = match serde_json::from_slice(&body_bytes) {
            Ok(value) => value,
            Err(_) => {
                return log_and_create_http_response("invalid payload", StatusCode::BAD_REQUEST);
            }
        };
        // an empty object carries no event, reject it like a non-object
        if payload.as_object().map_or(true, |fields| fields.is_empty()) {
            return log_and_create_http_response("invalid payload", StatusCode::BAD_REQUEST);
        }

        let event = LogEvent::normalize(&payload);

        let inserted = {
            let store = store.lock().await;
            match store.insert(&event) {
                Ok(inserted) => inserted,
                Err(e) => {
                    return log_and_create_http_response(
                        &format!("Error persisting log event: {e}"),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    );
                }
            }
        };
        if !inserted {
            debug!("Duplicate event {}, store insert ignored", event.event_id);
        }

        metrics.increment(event.level, &event.client_name, &event.category);

        let forward_request = ForwardRequest {
            category: event.category.clone(),
            payload,
        };
        if let Err(e) = forward_tx.send(forward_request).await {
            // best effort only: the event is already persisted and counted
            error!("Error enqueueing event for forwarding: {e}");
        }

        create_response(
            json!({"status": "ok"}).to_string(),
            "application/json",
            StatusCode::OK,
        )
    }

    async fn logs_handler(
        store: Arc<Mutex<EventStore>>,
        query: Option<&str>,
    ) -> http::Result<HttpResponse> {
        let limit = match parse_limit(query) {
            Ok(limit) => limit,
            Err(raw) => {
                return log_and_create_http_response(
                    &format!("Invalid limit parameter: {raw}"),
                    StatusCode::BAD_REQUEST,
                );
            }
        };

        let events = {
            let store = store.lock().await;
            match store.recent(limit) {
                Ok(events) => events,
                Err(e) => {
                    return log_and_create_http_response(
                        &format!("Error reading log events: {e}"),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    );
                }
            }
        };

        create_response(
            json!({ "logs": events }).to_string(),
            "application/json",
            StatusCode::OK,
        )
    }

    async fn analyze_handler(store: Arc<Mutex<EventStore>>) -> http::Result<HttpResponse> {
        let rows = {
            let store = store.lock().await;
            match store.counts_by_level() {
                Ok(rows) => rows,
                Err(e) => {
                    return log_and_create_http_response(
                        &format!("Error aggregating log events: {e}"),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    );
                }
            }
        };

        let mut counts = serde_json::Map::new();
        for (level, count) in rows {
            counts.insert(level, Value::from(count));
        }

        create_response(
            json!({ "counts": counts }).to_string(),
            "application/json",
            StatusCode::OK,
        )
    }
}

/// Parses the `limit` query parameter for `/logs`. Returns the raw value on
/// parse failure so the caller can report it.
fn parse_limit(query: Option<&str>) -> Result<usize, String> {
    let Some(query) = query else {
        return Ok(DEFAULT_LOGS_LIMIT);
    };
    let Some(raw) = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("limit="))
    else {
        return Ok(DEFAULT_LOGS_LIMIT);
    };
    match raw.parse::<usize>() {
        Ok(limit) => Ok(limit.min(MAX_LOGS_LIMIT)),
        Err(_) => Err(raw.to_string()),
    }
}
