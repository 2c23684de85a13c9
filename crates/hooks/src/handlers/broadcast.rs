use crate::traits::HookHandler;
use anyhow::Result;
use async_trait::async_trait;
use domain::HookEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Fans events out to live dashboard subscribers.
pub struct BroadcastHandler {
    tx: broadcast::Sender<HookEvent>,
}

impl BroadcastHandler {
    pub fn new(tx: broadcast::Sender<HookEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl HookHandler for BroadcastHandler {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn handle(&self, event: &HookEvent) -> Result<()> {
        if self.tx.send(event.clone()).is_err() {
            debug!(event = event.name(), "no live subscribers");
        }
        Ok(())
    }
}
