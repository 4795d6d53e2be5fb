// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Quill core
//!
//! Provider abstraction, fallback orchestration and HTTP API of the Quill
//! writing-feedback service.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Everything between an inbound request and a provider call

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
