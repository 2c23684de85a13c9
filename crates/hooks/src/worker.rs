use crate::traits::HookHandler;
use domain::HookEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Drains the hook queue until it closes or `cancel_token` fires. Every
/// handler sees every event; a failing handler is logged and skipped.
pub async fn run_hooks(
    mut rx: mpsc::Receiver<HookEvent>,
    handlers: Vec<Arc<dyn HookHandler>>,
    cancel_token: CancellationToken,
) {
    info!(handlers = handlers.len(), "hook worker started");
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                for handler in &handlers {
                    if let Err(e) = handler.handle(&event).await {
                        error!(
                            handler = handler.name(),
                            event = event.name(),
                            project = %event.project_id(),
                            "hook failed: {:?}", e
                        );
                    }
                }
            },
            _ = cancel_token.cancelled() => break,
        }
    }
    info!("hook worker stopped");
}
