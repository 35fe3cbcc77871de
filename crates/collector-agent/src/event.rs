// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Normalized severity level. Anything outside the whitelist collapses to
/// `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Error,
        Severity::Warning,
        Severity::Info,
        Severity::Debug,
    ];

    /// Case-insensitive parse with whitespace trimmed. Absent or
    /// unrecognized values normalize to `Info`.
    pub fn parse(level: Option<&str>) -> Self {
        match level.map(|l| l.trim().to_uppercase()).as_deref() {
            Some("ERROR") => Severity::Error,
            Some("WARNING") => Severity::Warning,
            Some("DEBUG") => Severity::Debug,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }
}

/// Category assigned when the payload carries no `type` field. Unlike the
/// severity level, a category that IS present is kept verbatim, even when no
/// persistor is configured for it: the stored row and the metric label must
/// reflect what the client sent.
pub const DEFAULT_CATEGORY: &str = "application";

/// A log event after field normalization.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub event_id: String,
    pub level: Severity,
    pub message: String,
    pub client_name: String,
    #[serde(rename = "type")]
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    /// Maps an arbitrary JSON payload onto the fixed schema.
    ///
    /// Missing or empty `event_id` gets a generated UUID v4. A timestamp
    /// that is absent or unparsable falls back to the current time.
    pub fn normalize(payload: &Value) -> LogEvent {
        let event_id = payload
            .get("event_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let timestamp = payload
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        LogEvent {
            event_id,
            level: Severity::parse(payload.get("level").and_then(Value::as_str)),
            message: payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            client_name: payload
                .get("client_name")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            category: payload
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_CATEGORY)
                .to_string(),
            timestamp,
        }
    }
}

/// Accepts RFC 3339 timestamps and, failing that, the offset-naive ISO 8601
/// form (`2025-06-01T12:00:00`), which is taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|ts| ts.and_utc())
}
