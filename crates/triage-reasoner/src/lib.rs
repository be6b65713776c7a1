//! Triage Reasoner - typed adapter around the external reasoning tool
//!
//! The analysis pipeline only ever talks to [`ReasoningTool`]. This crate
//! provides:
//! - The trait, its invocation options and output
//! - The stream-json event model and its compact rendering
//! - [`ClaudeCli`], the implementation driving the `claude` binary
//!
//! Stream parsing lives entirely in [`events`]; callers receive the final
//! candidate text and the rendered transcript, never raw protocol lines.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod claude;
pub mod error;
pub mod events;
pub mod tool;

pub use claude::ClaudeCli;
pub use error::ToolError;
pub use events::{ContentBlock, StreamEvent, StreamTranscript};
pub use tool::{IntegrationStatus, InvocationOptions, OutputMode, ReasoningTool, ToolOutput};
