// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod analysis_orchestrator;

pub use analysis_orchestrator::{AnalysisOrchestrator, CandidatePlan};
