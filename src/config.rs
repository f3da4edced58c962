use std::{env, str::FromStr, time::Duration};

use anyhow::Context;

use crate::outbound::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct PushConfig {
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub endpoint: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub push: Option<PushConfig>,
    pub mail: Option<MailConfig>,
    pub side_effect_timeout: Duration,
    pub outbox_capacity: usize,
    pub outbox_max_retries: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // A missing .env is fine, the environment may already be set.
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "tourbook=debug,tower_http=info".into());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

        let push = match (optional("PUSH_ENDPOINT"), optional("PUSH_API_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(PushConfig { endpoint, api_key }),
            _ => None,
        };
        let mail = match (optional("MAIL_ENDPOINT"), optional("MAIL_API_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(MailConfig {
                endpoint,
                api_key,
                from: optional("MAIL_FROM").unwrap_or_else(|| "no-reply@tourbook.local".into()),
            }),
            _ => None,
        };

        let side_effect_timeout =
            Duration::from_millis(parsed("SIDE_EFFECT_TIMEOUT_MS", 3_000u64)?);
        let outbox_capacity = parsed("OUTBOX_CAPACITY", 1_024usize)?;
        let outbox_max_retries = parsed("OUTBOX_MAX_RETRIES", 3usize)?;

        Ok(Self {
            database_url,
            rust_log,
            bind_addr,
            push,
            mail,
            side_effect_timeout,
            outbox_capacity,
            outbox_max_retries,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.outbox_max_retries,
            attempt_timeout: self.side_effect_timeout,
            ..RetryPolicy::default()
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}
