mod config;
mod http;
mod state;

use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Settings;
use domain::{Clock, SystemClock};
use engine::{CommentFormatter, EngineConfig, ModerationEngine, ThreadReader, TokenService};
use hooks::{
    BroadcastHandler, HookDispatcher, HookHandler, LogMailer, NotificationHandler,
    NotifySettings, WebhookHandler,
};
use http::router::build_router;
use state::AppState;
use storage::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("Failed to load configuration")?;

    let db = Db::new(&settings.database.url).await?;
    let store = Arc::new(db);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tokens = TokenService::new(settings.security.token_secret.clone());
    let formatter = Arc::new(CommentFormatter::default());
    let engine_config = EngineConfig {
        max_thread_depth: settings.moderation.max_thread_depth,
        default_page_size: settings.moderation.page_size,
    };
    let moderator: domain::ModeratorIdentity = settings.moderator.clone().into();

    let (dispatcher, rx_hooks) = HookDispatcher::channel(settings.hooks.queue_capacity);
    let (tx_events, _rx_events) = broadcast::channel(100);

    let broadcaster: Arc<dyn HookHandler> = Arc::new(BroadcastHandler::new(tx_events.clone()));
    let notifier: Arc<dyn HookHandler> = Arc::new(NotificationHandler::new(
        store.clone(),
        Arc::new(LogMailer),
        tokens.clone(),
        clock.clone(),
        NotifySettings {
            public_url: settings.server.public_url.clone(),
            owner_email: settings.hooks.owner_email.clone(),
            moderator: moderator.clone(),
        },
    ));
    let mut handlers = vec![broadcaster, notifier];
    if let Some(url) = settings.hooks.webhook_url.clone() {
        info!("Webhook delivery enabled: {}", url);
        handlers.push(Arc::new(WebhookHandler::new(
            url,
            settings.hooks.webhook_secret.clone(),
        )?));
    }

    let cancel_token = CancellationToken::new();
    let hook_worker = tokio::spawn(hooks::run_hooks(rx_hooks, handlers, cancel_token.clone()));

    let engine = ModerationEngine::new(
        store.clone(),
        Arc::new(dispatcher),
        clock.clone(),
        formatter.clone(),
        engine_config,
    );
    let reader = ThreadReader::new(store, formatter, engine_config);

    let state = AppState {
        engine: Arc::new(engine),
        reader: Arc::new(reader),
        tokens,
        clock,
        tx_events,
        admin_token: settings.security.admin_token.clone(),
        moderator,
    };

    let app = build_router(state, &settings.server.cors_origins);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    if let Err(e) = hook_worker.await {
        tracing::error!("Hook worker crashed: {:?}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
