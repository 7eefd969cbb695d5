use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

const DEFAULT_JWT_EXP_MINUTES: i64 = 10;
const DEFAULT_SESSION_CHECK_INTERVAL_SECS: u64 = 30;
const DEFAULT_SESSION_INACTIVITY_THRESHOLD_SECS: u64 = 120;
const DEFAULT_PUBLIC_RPS: u32 = 20;

const MAX_JWT_EXP_MINUTES: i64 = 60 * 24 * 30;
const MAX_SESSION_CHECK_INTERVAL_SECS: u64 = 60 * 60;
const MAX_SESSION_INACTIVITY_THRESHOLD_SECS: u64 = 60 * 60 * 24 * 7;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_exp_minutes: i64,
    pub session_check_interval_secs: u64,
    pub session_inactivity_threshold_secs: u64,
    pub public_rps: u32,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_exp_minutes: get_env_parse_or("JWT_EXP_MINUTES", DEFAULT_JWT_EXP_MINUTES)?,
            session_check_interval_secs: get_env_parse_or(
                "SESSION_CHECK_INTERVAL_SECS",
                DEFAULT_SESSION_CHECK_INTERVAL_SECS,
            )?,
            session_inactivity_threshold_secs: get_env_parse_or(
                "SESSION_INACTIVITY_THRESHOLD_SECS",
                DEFAULT_SESSION_INACTIVITY_THRESHOLD_SECS,
            )?,
            public_rps: get_env_parse_or("PUBLIC_RPS", DEFAULT_PUBLIC_RPS)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(Error::Config("JWT_SECRET must not be empty".to_string()));
        }
        if !(1..=MAX_JWT_EXP_MINUTES).contains(&self.jwt_exp_minutes) {
            return Err(Error::Config(format!(
                "JWT_EXP_MINUTES must be between 1 and {}",
                MAX_JWT_EXP_MINUTES
            )));
        }
        if !(1..=MAX_SESSION_CHECK_INTERVAL_SECS).contains(&self.session_check_interval_secs) {
            return Err(Error::Config(format!(
                "SESSION_CHECK_INTERVAL_SECS must be between 1 and {}",
                MAX_SESSION_CHECK_INTERVAL_SECS
            )));
        }
        if !(1..=MAX_SESSION_INACTIVITY_THRESHOLD_SECS)
            .contains(&self.session_inactivity_threshold_secs)
        {
            return Err(Error::Config(format!(
                "SESSION_INACTIVITY_THRESHOLD_SECS must be between 1 and {}",
                MAX_SESSION_INACTIVITY_THRESHOLD_SECS
            )));
        }
        if self.public_rps == 0 {
            return Err(Error::Config("PUBLIC_RPS must be positive".to_string()));
        }
        Ok(())
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
