use kabar_api::config::AppConfig;
use kabar_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, KABAR_PORT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    tracing::info!("starting kabar-api in {:?} mode", config.environment);

    let pool = kabar_api::database::connect(&config.database).await?;
    let state = AppState::new(config, pool);

    kabar_api::server::serve(state).await
}
