//! Error-source seam

use crate::error::ErrorSourceError;
use async_trait::async_trait;

/// Resolves an error-group reference to its most recent message
#[async_trait]
pub trait ErrorSource: Send + Sync + std::fmt::Debug {
    /// Latest event message of `group_id`; `None` when the group has no events
    async fn latest_message(&self, group_id: &str) -> Result<Option<String>, ErrorSourceError>;
}
