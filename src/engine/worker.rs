use async_trait::async_trait;

use super::job::WorkItem;
use super::outcome::ItemError;

/// The per-item remote operation a job is made of.
///
/// Implementations turn one item into a result or an [`ItemError`] carrying a
/// human-readable reason. Timeouts are the worker's business; the engine
/// records them like any other failure.
#[async_trait]
pub trait Worker: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    async fn process(&self, item: &WorkItem<Self::Input>) -> Result<Self::Output, ItemError>;

    /// Label used in progress messages for this item
    fn label(&self, item: &WorkItem<Self::Input>) -> String {
        format!("item {}", item.index + 1)
    }
}
