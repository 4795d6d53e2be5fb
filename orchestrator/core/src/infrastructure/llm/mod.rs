// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each provider adapter translates between the domain `LLMProvider` interface
// and one vendor API.

pub mod openai;
pub mod gemini;
pub mod registry;

pub use registry::ProviderRegistry;
