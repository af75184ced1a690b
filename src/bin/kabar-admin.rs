use clap::{Parser, Subcommand};

use kabar_api::config::AppConfig;

#[derive(Parser)]
#[command(name = "kabar-admin")]
#[command(about = "Administrative tasks for the kabar-api server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Print the stored digest for a password")]
    HashPassword { password: String },

    #[command(about = "Check database connectivity")]
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Migrate => {
            let config = AppConfig::from_env();
            let pool = kabar_api::database::connect(&config.database).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            println!("migrations applied");
        }
        Commands::HashPassword { password } => {
            println!("{}", kabar_api::schema::sha256_hex(&password));
        }
        Commands::Check => {
            let config = AppConfig::from_env();
            let pool = kabar_api::database::connect(&config.database).await?;
            kabar_api::database::health_check(&pool).await?;
            println!("database ok");
        }
    }
    Ok(())
}
