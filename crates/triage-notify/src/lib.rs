//! Triage Notify - result delivery
//!
//! [`ResultDispatcher`] posts a validated analysis to the requester's
//! channel by asking the reasoning tool to use its channel-posting
//! integration. Delivery is best effort: one attempt, no receipt.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod dispatcher;

pub use dispatcher::{DeliveryOutcome, DeliverySettings, ResultDispatcher, DELIVERY_PROMPT_FILE};
