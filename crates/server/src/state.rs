use domain::{Clock, HookEvent, ModeratorIdentity};
use engine::{ModerationEngine, ThreadReader, TokenService};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ModerationEngine>,
    pub reader: Arc<ThreadReader>,
    pub tokens: TokenService,
    pub clock: Arc<dyn Clock>,
    // admin live feed
    pub tx_events: broadcast::Sender<HookEvent>,
    pub admin_token: String,
    pub moderator: ModeratorIdentity,
}
