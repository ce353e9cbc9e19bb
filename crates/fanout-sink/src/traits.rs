//! Consumer trait definition.

use sync_core::EventData;

use crate::error::Result;

/// A delivery target bound to one rule.
///
/// # Usage Pattern
///
/// Workers and the backfill coordinator are generic over the consumer:
///
/// ```ignore
/// pub async fn run_worker<C: Consumer>(consumer: &C, rx: Receiver<EventData>) {
///     while let Some(event) = rx.recv().await {
///         consumer.accept(event).await?;
///     }
/// }
/// ```
///
/// The binary builds one concrete consumer per rule from configuration.
#[async_trait::async_trait]
pub trait Consumer: Send + Sync {
    /// Short sink name used in log lines.
    fn name(&self) -> &str;

    /// Deliver a single event. Equivalent to a one-element batch.
    async fn accept(&self, event: EventData) -> Result<()> {
        self.batch_accept(std::slice::from_ref(&event)).await
    }

    /// Deliver a batch of events.
    ///
    /// Keyed sinks remove every record named by a delete or update
    /// before-image first, then upsert every insert or update after-image.
    async fn batch_accept(&self, events: &[EventData]) -> Result<()>;

    /// Remove everything this consumer previously wrote. Called once at
    /// startup, before backfill, when the rule asks for it.
    async fn clear_before_data(&self) -> Result<()>;
}
