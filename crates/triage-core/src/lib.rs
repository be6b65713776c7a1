//! Triage Core - shared vocabulary of the bug triage pipeline
//!
//! Everything the pipeline components agree on lives here:
//! - Request, identifier and destination types
//! - The validated-analysis contract (required field markers)
//! - The error taxonomy shared across crates
//! - Explicit process configuration
//! - The external-process seam used for `git` and the reasoning tool
//!
//! # Example
//!
//! ```rust
//! use triage_core::{AnalysisRequest, ErrorInput};
//!
//! let request = AnalysisRequest::from_error_text("NullPointerException at OrderService.java:42")
//!     .with_destination("C123", None);
//!
//! assert!(matches!(request.error_input(), Ok(ErrorInput::Text(_))));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod analysis;
pub mod config;
pub mod error;
pub mod process;
pub mod types;

// Re-exports for convenience
pub use analysis::{missing_fields, AnalysisStage, ValidatedAnalysis, REQUIRED_FIELDS};
pub use config::{
    DispatchConfig, ErrorSourceConfig, LogFormat, NotificationConfig, ReasonerConfig,
    RepositoryConfig, Secret, ServerConfig, TriageConfig,
};
pub use error::{ConfigError, TriageError};
pub use process::{CommandOutput, CommandRunner, CommandSpec, ProcessError, TokioCommandRunner};
pub use types::{
    Acknowledgement, AnalysisId, AnalysisRequest, DeployedRevision, Destination, ErrorInput,
    ThreadContext,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
