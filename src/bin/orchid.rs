use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use log::info;

use orchid::config::DatabaseConfig;
use orchid::db::OrchidDb;
use orchid::logging::init_logging;
use orchid::repository::Repository;
use orchid::validator::StructuralValidator;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("[orchid]".cyan());
    let config = DatabaseConfig::parse();

    let db = OrchidDb::connect(&config)?;
    let repository = Repository::new(db, Box::new(StructuralValidator));
    repository.bootstrap().await?;
    info!("resource-definition storage is ready");
    Ok(())
}
