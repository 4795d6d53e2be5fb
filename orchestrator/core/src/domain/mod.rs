// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Canonical analysis schema, provider interface and service configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and rules shared by every other layer

pub mod analysis;
pub mod llm;
pub mod service_config;
