use clap::Parser;
use scheme_finder::{
    catalog::{import_csv, SqliteDetailStore},
    logging::init_tracing,
};
use std::path::PathBuf;
use tracing::info;

/// Load the scheme catalog CSV into the SQLite detail store
#[derive(Parser, Debug)]
#[command(name = "setup-db", version)]
struct Args {
    /// Catalog export to import
    #[arg(default_value = "updated_data.csv")]
    csv: PathBuf,

    /// Target database (defaults to DATABASE_URL, then sqlite://new_schemes.db)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let _guard = init_tracing("info")?;
    dotenv::dotenv().ok();

    let url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://new_schemes.db".to_string());

    let store = SqliteDetailStore::connect(&url, true).await?;
    let report = import_csv(store.pool(), &args.csv).await?;

    info!(rows = report.rows, database = %url, "✅ Scheme catalog imported");
    println!("Imported {} schemes into {}", report.rows, url);
    Ok(())
}
