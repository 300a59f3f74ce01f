use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use course_server::account::{self, Role};
use course_server::config::Config;
use course_server::error::Error;
use course_server::server::app;
use course_server::store::sqlite::SqliteStore;
use course_server::utils::init_log;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to database file
    #[arg(short, long, default_value = "database/courses.db")]
    database: PathBuf,

    /// Optional TOML config file; its database path overrides --database
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Log directory; stdout when absent
    #[arg(short, long)]
    log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_log(args.log.clone());

    let config = match &args.config {
        Some(path) => Some(Config::load(path)?),
        None => None,
    };
    let database = config
        .as_ref()
        .map(|c| c.database.clone())
        .unwrap_or(args.database);
    if let Some(dir) = database.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let store = Arc::new(
        SqliteStore::connect(&database)
            .await
            .map_err(|e| anyhow::anyhow!("open {}: {e}", database.display()))?,
    );

    if let Some(admin) = config.and_then(|c| c.bootstrap_admin) {
        match account::register(
            &*store,
            admin.name,
            admin.email.clone(),
            admin.password,
            Role::Admin,
        )
        .await
        {
            Ok(id) => info!("bootstrap admin {} created ({id})", admin.email),
            Err(Error::EmailInUse) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("serving on http://{}:{}", args.host, args.port);
    info!(
        "swagger ui at http://{}:{}/swagger-ui/",
        args.host, args.port
    );
    axum::serve(listener, app(store)).await?;
    Ok(())
}
