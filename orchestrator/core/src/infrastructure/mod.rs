// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod llm;
pub mod prompt_template_engine;

pub use llm::ProviderRegistry;
pub use prompt_template_engine::PromptTemplateEngine;
