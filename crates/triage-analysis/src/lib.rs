//! Triage Analysis - the validated retry/self-repair pipeline
//!
//! [`AnalysisOrchestrator`] drives the reasoning tool through the optional
//! issue-summary stage and the root-cause stage, classifying every attempt
//! with the rules in [`outcome`].

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod orchestrator;
pub mod outcome;
pub mod prompts;

pub use orchestrator::{AnalysisInput, AnalysisOrchestrator, AnalysisSettings};
pub use outcome::{classify_root_cause, is_connection_error, is_valid_summary, FailureKind, StageOutcome};
