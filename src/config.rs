use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Text-generation endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
    pub tips_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".into(),
            model: "llama3.2".into(),
            timeout: Duration::from_secs(20),
            tips_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "safebite".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "safebite-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };

        let defaults = LlmConfig::default();
        let llm = LlmConfig {
            url: std::env::var("LLM_URL").unwrap_or(defaults.url),
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            timeout: env_parse::<u64>("LLM_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            tips_timeout: env_parse::<u64>("LLM_TIPS_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.tips_timeout),
        };

        Ok(Self {
            database_url,
            jwt,
            llm,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
