use config::ConfigError;
use domain::ModeratorIdentity;
use serde::Deserialize;
use std::collections::HashMap;

const ENV_PREFIX: &str = "THREADMOD_";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub security: SecuritySettings,
    pub moderator: ModeratorSettings,
    pub moderation: ModerationSettings,
    pub hooks: HookSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
    // base of every emailed link
    pub public_url: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Deserialize, Clone)]
pub struct SecuritySettings {
    pub admin_token: String,
    pub token_secret: String,
}

/// Identity recorded on replies written through the admin API.
#[derive(Deserialize, Clone)]
pub struct ModeratorSettings {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<ModeratorSettings> for ModeratorIdentity {
    fn from(m: ModeratorSettings) -> Self {
        ModeratorIdentity {
            id: m.id,
            email: m.email,
            name: m.name,
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct ModerationSettings {
    pub max_thread_depth: usize,
    pub page_size: u32,
}

#[derive(Deserialize, Clone)]
pub struct HookSettings {
    pub queue_capacity: usize,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub owner_email: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        let env_map = env_overrides(std::env::vars());
        let env_json =
            serde_json::to_string(&env_map).map_err(|e| ConfigError::Foreign(Box::new(e)))?;

        let s = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.cors_origins", "*")?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("database.url", "sqlite://data/threadmod.db")?
            .set_default("security.admin_token", "admin_secret_change_me")?
            .set_default("security.token_secret", "token_secret_change_me")?
            .set_default("moderator.id", "owner")?
            .set_default("moderator.name", "Moderator")?
            .set_default("moderation.max_thread_depth", 64)?
            .set_default("moderation.page_size", 10)?
            .set_default("hooks.queue_capacity", 256)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(config::File::from_str(&env_json, config::FileFormat::Json))
            .build()?;

        s.try_deserialize()
    }
}

/// `THREADMOD_HOOKS__WEBHOOK_URL` becomes `hooks.webhook_url`.
fn env_overrides(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .map(|(k, v)| {
            let key = k
                .trim_start_matches(ENV_PREFIX)
                .replace("__", ".")
                .to_lowercase();
            (key, v)
        })
        .collect()
}
