//! Rule workers: one task per rule draining its queue into its consumer.

use std::sync::Arc;

use fanout_sink::{Consumer, SinkError};
use sync_core::EventData;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::SinkErrorPolicy;

impl SinkErrorPolicy {
    /// Log a delivery failure, and turn it into an error under `abort`.
    pub fn handle(&self, rule: &str, what: &str, err: SinkError) -> anyhow::Result<()> {
        tracing::error!(rule, policy = ?self, "Failed to deliver {what}: {err}");
        match self {
            SinkErrorPolicy::Log => Ok(()),
            SinkErrorPolicy::Abort => {
                Err(anyhow::Error::new(err).context(format!("Rule '{rule}' failed to deliver {what}")))
            }
        }
    }
}

/// Deliver queued events one at a time until every sender is gone.
///
/// Returns the number of events handed to the consumer, or the first
/// delivery error under [`SinkErrorPolicy::Abort`].
pub async fn run_worker<C>(
    rule: String,
    consumer: Arc<C>,
    mut queue: mpsc::Receiver<EventData>,
    policy: SinkErrorPolicy,
) -> anyhow::Result<u64>
where
    C: Consumer + ?Sized,
{
    tracing::debug!(rule = %rule, sink = consumer.name(), "Rule worker started");
    let mut delivered = 0u64;
    while let Some(event) = queue.recv().await {
        let table = event.table.clone();
        let action = event.action;
        match consumer.accept(event).await {
            Ok(()) => delivered += 1,
            Err(e) => policy.handle(&rule, &format!("{action} on {table}"), e)?,
        }
    }
    tracing::info!(rule = %rule, delivered, "Rule worker stopped");
    Ok(delivered)
}

/// The running workers of every rule.
#[derive(Default)]
pub struct Workers {
    tasks: JoinSet<(String, anyhow::Result<u64>)>,
}

impl Workers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<C>(
        &mut self,
        rule: String,
        consumer: Arc<C>,
        queue: mpsc::Receiver<EventData>,
        policy: SinkErrorPolicy,
    ) where
        C: Consumer + ?Sized + 'static,
    {
        self.tasks.spawn(async move {
            let result = run_worker(rule.clone(), consumer, queue, policy).await;
            (rule, result)
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next worker to stop. `None` when none are left.
    pub async fn next_stopped(&mut self) -> Option<(String, anyhow::Result<u64>)> {
        let joined = self.tasks.join_next().await?;
        Some(match joined {
            Ok(stopped) => stopped,
            Err(e) => ("<unknown>".to_string(), Err(anyhow::anyhow!("Rule worker panicked: {e}"))),
        })
    }

    /// Wait for every worker to drain its queue and stop. Returns the first
    /// worker error, after all of them have stopped.
    pub async fn join_all(&mut self) -> anyhow::Result<()> {
        let mut first_error = None;
        while let Some((rule, result)) = self.next_stopped().await {
            if let Err(e) = result {
                tracing::error!(rule = %rule, "Rule worker failed: {e:#}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
