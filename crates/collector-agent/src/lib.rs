// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod collector;
pub mod config;
pub mod event;
pub mod forwarder;
pub mod http_utils;
pub mod metrics;
pub mod store;
