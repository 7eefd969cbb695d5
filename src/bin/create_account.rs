//! Seeds a candidate or recruiter login.
//!
//! `create_account <candidate|recruiter> <email> <password>`

use anyhow::{anyhow, Context};
use proctor_backend::{
    database::pool::{create_pool, run_migrations},
    models::account::Role,
    services::account_service::{register, PgAccountStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let (role, email, password) = match (args.next(), args.next(), args.next()) {
        (Some(role), Some(email), Some(password)) => (role, email, password),
        _ => return Err(anyhow!("usage: create_account <candidate|recruiter> <email> <password>")),
    };
    let role: Role = role.parse().map_err(|e: String| anyhow!(e))?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let store = PgAccountStore::new(pool);
    let account = register(&store, role, &email, &password).await?;
    println!("created {} #{} <{}>", role, account.id, account.email);
    Ok(())
}
