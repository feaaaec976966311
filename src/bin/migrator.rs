use dotenvy::dotenv;
use returns_optimizer::{
    infrastructure::{config::Config, db},
    telemetry,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    telemetry::init();

    let config = Config::from_env()?;
    if config.store.provider != "postgres" {
        anyhow::bail!(
            "migrations require the postgres store, configured provider is {}",
            config.store.provider
        );
    }
    let pool = db::connect(&config.database).await?;
    db::run_migrations(&pool).await?;

    info!("database migrations completed");

    Ok(())
}
