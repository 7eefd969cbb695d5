use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::models::account::{Account, Role};
use crate::utils::crypto::{dummy_hash, hash_password, verify_password};

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>>;
    async fn create(&self, role: Role, email: &str, password_hash: &str) -> Result<Account>;
}

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountStore {
    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT id, email, password FROM {} WHERE LOWER(email) = LOWER($1)",
            role.accounts_table()
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn create(&self, role: Role, email: &str, password_hash: &str) -> Result<Account> {
        let sql = format!(
            "INSERT INTO {} (email, password) VALUES ($1, $2) RETURNING id, email, password",
            role.accounts_table()
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    Error::Conflict(format!("A {} with this email already exists", role))
                }
                other => Error::from(other),
            })?;
        Ok(account)
    }
}

/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn authenticate(
    accounts: &dyn AccountRepository,
    role: Role,
    email: &str,
    password: &str,
) -> Result<Account> {
    let account = accounts.find_by_email(role, email).await?;
    let matched = match &account {
        Some(account) => verify_password(password, &account.password),
        None => {
            if let Some(hash) = dummy_hash() {
                let _ = verify_password(password, hash);
            }
            false
        }
    };
    match account {
        Some(account) if matched => Ok(account),
        _ => {
            tracing::info!(role = %role, "login rejected");
            Err(Error::Unauthorized("Invalid email or password".to_string()))
        }
    }
}

pub async fn register(
    accounts: &dyn AccountRepository,
    role: Role,
    email: &str,
    password: &str,
) -> Result<Account> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(Error::BadRequest("Email and password are required".to_string()));
    }
    let hash = hash_password(password)?;
    accounts.create(role, email, &hash).await
}
