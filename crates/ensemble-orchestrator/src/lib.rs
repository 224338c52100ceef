//! Task orchestration for agent ensembles.
//!
//! Takes a [`ComplexTask`](ensemble_core::ComplexTask) through the full
//! pipeline: LLM-backed analysis with graceful degradation, layered
//! execution planning, sequential dispatch to registered workers and
//! synthesis of their results into one scored outcome.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Runs tasks end to end and scores the outcome.
//! - [`TaskAnalyzer`] — Classifies tasks, with heuristic and fixed fallbacks.
//! - [`ExecutionPlanner`] — Turns an analysis into a dependency-ordered plan.
//! - [`WorkerRegistry`] — The workers available for dispatch, one per type.

/// Task classification from a completion client, with fallbacks.
pub mod analyzer;
/// The orchestration loop and run scoring.
pub mod engine;
/// Analysis-to-plan translation.
pub mod planner;
/// Worker registration and lookup.
pub mod registry;

pub use analyzer::{
    fallback_analysis, heuristic_analysis, parse_analysis, AnalysisParseError, TaskAnalyzer,
};
pub use engine::{Orchestrator, PlanPreview};
pub use planner::ExecutionPlanner;
pub use registry::WorkerRegistry;
