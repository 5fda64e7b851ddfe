//! One-shot expired-session sweep, for deployments that prefer a cron job
//! over the in-process [`authd::sweeper::Sweeper`].

use authd::{config::Config, db::connection::create_pool, repositories::token as token_repo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load()?;
    let pool = create_pool(&config).await?;

    let deleted = token_repo::sweep_expired(&pool).await?;
    tracing::info!(deleted, "swept expired refresh sessions");

    Ok(())
}
