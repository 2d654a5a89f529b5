#![warn(clippy::all)]

mod alerting;
mod config;
mod database;
mod monitoring;
mod pool;
mod web;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use crate::alerting::{AlertDispatcher, HttpMailer, SenderDirectory};
use crate::config::Config;
use crate::database::{LibsqlStore, Store, initialize_database};
use crate::monitoring::{AlertPolicy, CheckRunner, Prober};
use crate::web::AppState;

const MAIL_TIMEOUT_SECONDS: u64 = 30;

#[derive(Parser)]
#[command(name = "watchpost", version, about = "Endpoint reachability monitor")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    logger::init_tracing();
    let cli = Cli::parse();

    let config = Config::from_config(cli.config.as_deref())
        .map_err(|error| anyhow!("Failed to load configuration: {error:?}"))?;
    info!("{config}");

    let pool = pool::open_pool(&config.database.path)
        .await
        .context("Failed to open database")?;
    {
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
    }
    let store: Arc<dyn Store> = Arc::new(LibsqlStore::new_from_pool(pool));

    let prober = Arc::new(Prober::new(
        config.monitoring.probe_timeout_seconds,
        config.monitoring.tcp_timeout_seconds,
    )?);
    let mailer = Arc::new(HttpMailer::new(config.alerting.endpoint.clone(), MAIL_TIMEOUT_SECONDS)?);
    let dispatcher = Arc::new(AlertDispatcher::new(
        store.clone(),
        mailer,
        SenderDirectory::new(config.default_sender(), config.alerting.senders.clone()),
    ));

    let runner = Arc::new(CheckRunner::new(
        store.clone(),
        prober,
        dispatcher,
        AlertPolicy::new(config.monitoring.alert_after_minutes, config.monitoring.history_cap),
        Duration::from_secs(config.monitoring.interval_seconds),
        config.monitoring.edge_monitors.iter().cloned().collect(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner_handle = runner.clone().spawn(shutdown_rx);

    let state = actix_web::web::Data::new(AppState { store, runner });
    let bind = (config.http.bind.clone(), config.http.port);
    info!("Starting HTTP API on {}:{}", bind.0, bind.1);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(web::routes::routes))
        .bind(bind)?
        .run()
        .await?;

    // The HTTP server handles the termination signal; stop the check loop
    // before exiting. In-flight probes are abandoned - any committed
    // alert_sent flag prevents duplicate alerts on the next start.
    let _ = shutdown_tx.send(true);
    let _ = runner_handle.await;

    Ok(())
}
