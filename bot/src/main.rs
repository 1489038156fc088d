use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod config;
mod scheduler;
mod timeframe;

use config::BotConfig;
use scheduler::TimeframeScheduler;
use sg_gateway::market::BinanceCandleSource;
use sg_gateway::Dispatcher;
use sg_signals::SignalEngine;
use sg_storage::{catalog, PositionKey, PositionStore};
use timeframe::Timeframe;

#[derive(Parser, Debug)]
#[clap(name = "sg-bot", about = "EMA/CDC signal detector with position tracking")]
struct Args {
    #[clap(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scheduler per configured timeframe until Ctrl-C
    Run,
    /// Evaluate one timeframe now and print the batch report
    Tick {
        #[clap(long)]
        timeframe: String,
    },
    /// List stored positions in key order
    Positions {
        #[clap(long, default_value = "")]
        prefix: String,
    },
    /// Delete a stored position, e.g. BTCUSDT/5m/EMA
    Forget { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Loading configuration from {:?}", args.config);
    let config = BotConfig::load(&args.config)?;

    match args.command {
        Command::Run => run(config).await,
        Command::Tick { timeframe } => tick(config, &timeframe).await,
        Command::Positions { prefix } => list_positions(&config, &prefix).await,
        Command::Forget { key } => forget(&config, &key).await,
    }
}

async fn build_engine(config: &BotConfig) -> Result<Arc<SignalEngine>> {
    let positions = PositionStore::open(&config.storage.positions)?;
    let catalog = catalog::connect(&config.storage.catalog).await?;
    let candles = Arc::new(BinanceCandleSource::new(&config.gateway.market_data)?);
    let dispatcher = Arc::new(Dispatcher::from_config(&config.gateway)?);

    Ok(Arc::new(SignalEngine::new(
        catalog,
        candles,
        positions,
        dispatcher,
        config.engine.clone(),
    )))
}

async fn run(config: BotConfig) -> Result<()> {
    config.validate()?;
    let engine = build_engine(&config).await?;
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for (timeframe, settle_delay) in config.timeframes()? {
        let scheduler = TimeframeScheduler::new(engine.clone(), timeframe, settle_delay);
        handles.push(tokio::spawn(scheduler.run(cancel.child_token())));
    }
    info!("Started {} schedulers", handles.len());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancel.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Scheduler task failed: {}", e);
        }
    }

    info!("sg-bot stopped");
    Ok(())
}

async fn tick(config: BotConfig, timeframe: &str) -> Result<()> {
    let timeframe: Timeframe = timeframe.parse()?;
    config.engine.validate()?;
    config.gateway.validate()?;
    let engine = build_engine(&config).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let report = engine.run_batch(timeframe.label(), &cancel).await;
    println!("{}", report);
    Ok(())
}

async fn list_positions(config: &BotConfig, prefix: &str) -> Result<()> {
    let store = PositionStore::open(&config.storage.positions)?;

    for (key, record) in store.list(prefix).await? {
        match record {
            Ok(record) => println!(
                "{:<32} {:<6} ema={}",
                key,
                record.position.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                record.ema_period.map(|e| e.to_string()).unwrap_or_else(|| "-".to_string())
            ),
            Err(e) => println!("{:<32} unreadable: {}", key, e),
        }
    }
    Ok(())
}

async fn forget(config: &BotConfig, key: &str) -> Result<()> {
    if let Err(e) = key.parse::<PositionKey>() {
        warn!("{} is not a position key ({}), removing anyway", key, e);
    }

    let store = PositionStore::open(&config.storage.positions)?;
    store.remove(key).await?;
    println!("removed {}", key);
    Ok(())
}
