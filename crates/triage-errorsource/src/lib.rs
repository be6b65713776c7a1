//! Triage Errorsource - resolving error-group references to error text
//!
//! - [`ErrorSource`]: the lookup seam request intake depends on
//! - [`CloudErrorReporting`]: Google Cloud Error Reporting over HTTPS, with
//!   service-account JWT-bearer auth and cached access tokens

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cloud;
pub mod error;
pub mod source;

pub use cloud::CloudErrorReporting;
pub use error::ErrorSourceError;
pub use source::ErrorSource;
