use anyhow::Result;
use async_trait::async_trait;
use domain::HookEvent;

/// One consumer of committed moderation events.
#[async_trait]
pub trait HookHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &HookEvent) -> Result<()>;
}
