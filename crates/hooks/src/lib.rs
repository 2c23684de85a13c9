mod dispatcher;
mod handlers;
mod mailer;
mod templates;
mod traits;
mod worker;

pub use dispatcher::HookDispatcher;
pub use handlers::broadcast::BroadcastHandler;
pub use handlers::notify::{NotificationHandler, NotifySettings};
pub use handlers::webhook::{sign_body, WebhookHandler, SIGNATURE_HEADER};
pub use mailer::{LogMailer, MailMessage, Mailer};
pub use traits::HookHandler;
pub use worker::run_hooks;
