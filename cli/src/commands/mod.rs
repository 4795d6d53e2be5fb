// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Quill CLI

pub mod analyze;
pub mod config;
pub mod providers;

pub use self::config::ConfigCommand;
