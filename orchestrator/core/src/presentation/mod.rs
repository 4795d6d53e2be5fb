// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`quill-core`)
//!
//! HTTP surface that translates external requests into orchestrator calls.
//! **No business logic lives here**; analysis work is delegated to
//! [`crate::application::AnalysisOrchestrator`].
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | REST endpoints, error-to-status mapping, router assembly |
//! | [`rate_limit`] | Per-client-IP request limiting middleware |

pub mod api;
pub mod rate_limit;
