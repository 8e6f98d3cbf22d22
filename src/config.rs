use std::env;
use std::time::Duration;

/// Runtime configuration, read once at startup and injected into handlers.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Where the video catalog lives. Defaults to a local SQLite file.
    pub database_url: String,
    /// Channel users must join before searching, e.g. `@moviecastmovie`.
    /// Unset means no membership gate.
    pub force_sub_channel: Option<String>,
    /// How long bot-sent search/start replies stay before deletion.
    pub ephemeral_ttl: Duration,
}

const DEFAULT_EPHEMERAL_TTL_SECS: u64 = 120;

impl BotConfig {
    pub fn from_env() -> Self {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:videos.db".to_string());
        let force_sub_channel = env::var("FORCE_SUB_CHANNEL")
            .ok()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .map(|c| if c.starts_with('@') { c } else { format!("@{c}") });
        let ephemeral_ttl = env::var("EPHEMERAL_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_EPHEMERAL_TTL_SECS));

        Self { database_url, force_sub_channel, ephemeral_ttl }
    }
}
