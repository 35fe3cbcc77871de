// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Mutex;

use crate::event::Severity;

/// Content type for the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const LOGS_TOTAL_NAME: &str = "logs_total";
const LOGS_TOTAL_HELP: &str = "Total log events received";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SeriesKey {
    level: &'static str,
    client: String,
    category: String,
}

/// In-process counter registry for the pull-based `/metrics` endpoint.
///
/// One counter, `logs_total`, keyed by `(level, client, category)`. The
/// interior mutex is only held for map access, never across I/O.
pub struct MetricsRegistry {
    series: Mutex<HashMap<SeriesKey, u64>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        MetricsRegistry {
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn increment(&self, level: Severity, client: &str, category: &str) {
        let key = SeriesKey {
            level: level.as_str(),
            client: client.to_string(),
            category: category.to_string(),
        };
        #[allow(clippy::expect_used)]
        let mut series = self.series.lock().expect("lock poisoned");
        *series.entry(key).or_insert(0) += 1;
    }

    /// Renders every series in the Prometheus text exposition format.
    /// Label sets are sorted so the output is deterministic.
    pub fn render(&self) -> String {
        let mut entries: Vec<(SeriesKey, u64)> = {
            #[allow(clippy::expect_used)]
            let series = self.series.lock().expect("lock poisoned");
            series.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        entries.sort();

        let mut out = String::new();
        let _ = writeln!(out, "# HELP {LOGS_TOTAL_NAME} {LOGS_TOTAL_HELP}");
        let _ = writeln!(out, "# TYPE {LOGS_TOTAL_NAME} counter");
        for (key, value) in entries {
            let _ = writeln!(
                out,
                "{LOGS_TOTAL_NAME}{{level=\"{}\",client=\"{}\",category=\"{}\"}} {value}",
                key.level,
                escape_label_value(&key.client),
                escape_label_value(&key.category),
            );
        }
        out
    }
}

/// Escapes a label value per the exposition format: backslash, double quote
/// and line feed.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}
