use clap::{Parser, Subcommand};
use logistix_api::{config, db, migrator::Migrator};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the Logistix schema", version)]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<MigrationCommand>,
}

#[derive(Subcommand, Clone, Copy)]
enum MigrationCommand {
    /// Apply every pending migration (default)
    Up,
    /// Roll back the most recent migration
    Down,
    /// Print applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let url = cli.database_url.unwrap_or_else(|| cfg.database_url.clone());
    info!("Connecting to database for migrations");
    let pool = db::establish_connection(&url).await?;

    let result = match cli.command.unwrap_or(MigrationCommand::Up) {
        MigrationCommand::Up => Migrator::up(&pool, None).await,
        MigrationCommand::Down => Migrator::down(&pool, Some(1)).await,
        MigrationCommand::Status => Migrator::status(&pool).await,
    };

    if let Err(e) = result {
        error!("Migration command failed: {}", e);
        return Err(e.into());
    }

    info!("Migration command completed successfully");
    db::close_pool(pool).await?;
    Ok(())
}
