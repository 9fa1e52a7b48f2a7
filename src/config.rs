use std::env;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use dotenvy::dotenv;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    Mysql,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub jwt_secret: String,
    pub access_token_ttl: usize,

    // Record store
    pub record_store: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Teammate roster
    pub authorized_users_file: Option<String>,
    pub seed_temp_password: Option<String>,

    /// Kudos deducted per missed meeting.
    pub missed_meeting_penalty: i64,
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let record_store = var_or("RECORD_STORE", StoreBackend::Mysql)?;
        let database_url = optional("DATABASE_URL");
        if record_store == StoreBackend::Mysql && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set when RECORD_STORE=mysql"));
        }

        let authorized_users_file = optional("AUTHORIZED_USERS_FILE");
        let seed_temp_password = optional("SEED_TEMP_PASSWORD");
        if authorized_users_file.is_some() && seed_temp_password.is_none() {
            return Err(anyhow!(
                "SEED_TEMP_PASSWORD must be set when AUTHORIZED_USERS_FILE is given"
            ));
        }

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 86_400)?, // default 24h

            record_store,
            database_url,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout_secs: var_or("DB_ACQUIRE_TIMEOUT_SECS", 5)?,

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            authorized_users_file,
            seed_temp_password,

            missed_meeting_penalty: var_or("MISSED_MEETING_PENALTY", 5)?,
        })
    }
}
