// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Outer surfaces for privacy scans: REST API, remediation snippets, the
//! scan audit log and configuration resolution.

pub mod audit;
pub mod config;
pub mod remediation;
pub mod rest;
