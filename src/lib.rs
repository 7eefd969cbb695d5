pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::{
    account_service::{AccountRepository, PgAccountStore},
    session_store::{PgSessionStore, SessionRepository},
};
use crate::utils::token::TokenCodec;

#[derive(Clone)]
pub struct AppState {
    pub codec: TokenCodec,
    pub accounts: Arc<dyn AccountRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let ttl = chrono::Duration::try_minutes(config.jwt_exp_minutes).ok_or_else(|| {
            Error::Config(format!(
                "JWT_EXP_MINUTES out of range: {}",
                config.jwt_exp_minutes
            ))
        })?;
        let codec = TokenCodec::new(&config.jwt_secret, ttl);
        Ok(Self::with_repositories(
            codec,
            Arc::new(PgAccountStore::new(pool.clone())),
            Arc::new(PgSessionStore::new(pool)),
        ))
    }

    pub fn with_repositories(
        codec: TokenCodec,
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            codec,
            accounts,
            sessions,
        }
    }
}
