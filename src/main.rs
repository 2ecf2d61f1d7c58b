use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use bandbot::api::dexscreener::{DexScreenerClient, PairPriceFeed};
use bandbot::api::jupiter::{JupiterClient, JupiterSwapExecutor};
use bandbot::api::solana_rpc::SolanaRpcClient;
use bandbot::api::{BalanceSource, PriceSource, SwapExecutor};
use bandbot::config::{BotConfig, ExecutorKind};
use bandbot::execution::{CsvSwapLogger, PaperWallet, PollingLoop};
use bandbot::Balances;
use clap::Parser;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "bandbot")]
#[command(about = "Volatility band trading bot for a single token pair")]
struct Args {
    /// TOML config file, skipped when missing
    #[arg(short, long, default_value = "bandbot.toml")]
    config: PathBuf,

    /// Force simulated swaps regardless of the config file
    #[arg(long)]
    dry_run: bool,

    /// Override the configured executor
    #[arg(long, value_enum)]
    executor: Option<ExecutorKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    let mut config = BotConfig::load(Some(&args.config))
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if args.dry_run {
        config.execution.dry_run = true;
    }
    if let Some(executor) = args.executor {
        config.execution.executor = executor;
    }
    config.validate().context("Invalid command line overrides")?;

    tracing::info!("🚀 BandBot starting");
    log_configuration(&config);

    // Resolve the pool once, then poll it
    let dexscreener = DexScreenerClient::new();
    let pair = dexscreener
        .resolve_pair(&config.pair.base, &config.pair.quote)
        .await
        .context("Failed to resolve trading pair on DexScreener")?;
    tracing::info!(
        "✓ Using pool {} (liquidity ${:.0})",
        pair.pair_address,
        pair.liquidity_usd
    );
    let price_feed = PairPriceFeed::new(dexscreener, pair);

    let log = CsvSwapLogger::new(&config.execution.log_file)
        .with_context(|| format!("Failed to open swap log {}", config.execution.log_file))?;

    match config.execution.executor {
        ExecutorKind::Paper => {
            let wallet = Arc::new(PaperWallet::new(
                config.pair.base.clone(),
                config.pair.quote.clone(),
                Balances {
                    base: config.execution.paper_base_balance,
                    quote: config.execution.paper_quote_balance,
                },
            ));
            run_until_ctrl_c(&config, price_feed, wallet.clone(), wallet, log).await
        }
        ExecutorKind::Jupiter => {
            let owner = config
                .rpc
                .wallet_address
                .clone()
                .ok_or_else(|| anyhow!("rpc.wallet_address is required for the jupiter executor"))?;
            let balances = SolanaRpcClient::new(config.rpc.url.clone(), owner);
            let executor = JupiterSwapExecutor::new(
                JupiterClient::new(),
                config.pair.base.clone(),
                config.pair.quote.clone(),
                config.execution.slippage_bps,
            );
            run_until_ctrl_c(&config, price_feed, balances, executor, log).await
        }
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bandbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_configuration(config: &BotConfig) {
    tracing::info!("\n📊 Configuration:");
    tracing::info!(
        "  Pair: {}/{}",
        config.pair.base.symbol,
        config.pair.quote.symbol
    );
    tracing::info!(
        "  Window: {} samples (warm-up every {}s, then every {}s)",
        config.window.capacity,
        config.window.warmup_interval_secs,
        config.window.steady_interval_secs
    );
    tracing::info!(
        "  Multipliers: buy {} / sell {}",
        config.strategy.buy_threshold_multiplier,
        config.strategy.sell_threshold_multiplier
    );
    tracing::info!(
        "  Emergency drop: {} ({}% of base)",
        config.strategy.price_drop_threshold,
        config.strategy.emergency_swap_percentage * 100.0
    );
    tracing::info!(
        "  Executor: {:?} ({})",
        config.execution.executor,
        if config.execution.dry_run { "dry-run" } else { "live" }
    );
    tracing::info!("  Swap log: {}", config.execution.log_file);
}

async fn run_until_ctrl_c<P, B, S>(
    config: &BotConfig,
    price_source: P,
    balance_source: B,
    executor: S,
    log: CsvSwapLogger,
) -> anyhow::Result<()>
where
    P: PriceSource,
    B: BalanceSource,
    S: SwapExecutor,
{
    // Held until the loop returns so a broken signal handler cannot end it
    let (_shutdown_tx, shutdown_rx) = shutdown_on(tokio::signal::ctrl_c());

    tracing::info!("\nPress Ctrl+C to stop...\n");

    let mut bot = PollingLoop::new(config, price_source, balance_source, executor, log);
    bot.run(shutdown_rx).await.context("Polling loop aborted")?;

    tracing::info!("👋 BandBot stopped");
    Ok(())
}

/// Flip the shutdown channel once `signal` resolves
///
/// If the signal cannot be listened for, the loop keeps running and only
/// the error is reported.
fn shutdown_on<F>(signal: F) -> (Arc<watch::Sender<bool>>, watch::Receiver<bool>)
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (tx, rx) = watch::channel(false);
    let tx = Arc::new(tx);
    let notifier = tx.clone();

    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                tracing::info!("\n⚠️  Received Ctrl+C, stopping after the current cycle...");
                let _ = notifier.send(true);
            }
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl+C: {}. Stop the process externally", e);
            }
        }
    });

    (tx, rx)
}
