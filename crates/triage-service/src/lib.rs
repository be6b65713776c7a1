//! Triage Service - the long-running bug triage process
//!
//! - [`TriageIntake`]: validation, error-text resolution, acknowledgement
//! - [`WorkerPool`]: bounded background dispatch with cancellation
//! - [`TriagePipeline`]: staging, analysis and delivery for one run
//! - [`http`]: warp routes
//! - [`telemetry`]: tracing subscriber setup

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod app;
pub mod http;
pub mod intake;
pub mod pipeline;
pub mod pool;
pub mod telemetry;

pub use app::TriageService;
pub use intake::TriageIntake;
pub use pipeline::{PipelineJob, PipelineOutcome, TriagePipeline};
pub use pool::{PoolStats, WorkerPool};
