use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bandbot::backtest::{BacktestReport, BacktestRunner, MarketScenario, SyntheticPriceGenerator};
use bandbot::config::BotConfig;
use bandbot::Balances;
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "backtest")]
#[command(about = "Replay price series through the trading loop against a paper wallet")]
struct Args {
    /// TOML config file, skipped when missing
    #[arg(short, long, default_value = "bandbot.toml")]
    config: PathBuf,

    /// CSV with a `price` column; synthetic scenarios run when omitted
    #[arg(long)]
    prices: Option<PathBuf>,

    /// Samples per synthetic scenario
    #[arg(long, default_value_t = 500)]
    samples: usize,

    /// Seed for the synthetic generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting quote balance
    #[arg(long, default_value_t = 1000.0)]
    quote: f64,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    price: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("bandbot=warn")
        .init();

    let args = Args::parse();
    let config = BotConfig::load(Some(&args.config))
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║            BANDBOT BACKTESTING SUITE                  ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let runner = BacktestRunner::new(
        config,
        Balances {
            base: 0.0,
            quote: args.quote,
        },
    );

    let mut results = Vec::new();

    if let Some(path) = &args.prices {
        let prices = load_prices(path)?;
        println!("\nReplaying {} prices from {}", prices.len(), path.display());
        let report = runner.run(prices).await.context("Backtest failed")?;
        results.push((path.display().to_string(), report));
    } else {
        let scenarios = [
            (MarketScenario::Uptrend, "📈 Uptrend"),
            (MarketScenario::Downtrend, "📉 Downtrend"),
            (MarketScenario::Sideways, "↔️  Sideways (mean-reverting)"),
            (MarketScenario::Volatile, "⚡ Volatile (±5% swings)"),
            (MarketScenario::Crash, "💥 Crash (3 x -6%)"),
        ];

        for (scenario, name) in scenarios {
            let prices = SyntheticPriceGenerator::new(args.seed).generate(scenario, args.samples);
            match runner.run(prices).await {
                Ok(report) => results.push((name.to_string(), report)),
                Err(e) => eprintln!("❌ Backtest failed for {}: {}", name, e),
            }
        }
    }

    print_summary(&results);
    Ok(())
}

fn load_prices(path: &Path) -> anyhow::Result<Vec<f64>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut prices = Vec::new();
    for (line, row) in reader.deserialize::<PriceRow>().enumerate() {
        let row = row.with_context(|| format!("Bad price row {}", line + 2))?;
        if !row.price.is_finite() || row.price <= 0.0 {
            bail!(
                "Invalid price {} on row {} of {}",
                row.price,
                line + 2,
                path.display()
            );
        }
        prices.push(row.price);
    }
    Ok(prices)
}

fn print_summary(results: &[(String, BacktestReport)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<30} {:>10} {:>10} {:>6} {:>6} {:>6} {:>8}",
        "Scenario", "Final", "Return%", "Buys", "Sells", "Emerg", "Failed"
    );
    println!("{}", "─".repeat(82));

    for (name, report) in results {
        println!(
            "{:<30} {:>10.2} {:>10.2} {:>6} {:>6} {:>6} {:>8}",
            name,
            report.final_value,
            report.return_pct(),
            report.buys,
            report.sells,
            report.emergency_sells,
            report.failed_cycles
        );
    }

    if let Some((best_name, best)) = results
        .iter()
        .max_by(|a, b| a.1.return_pct().total_cmp(&b.1.return_pct()))
    {
        println!("\n🏆 Best Scenario: {} ({:+.2}%)", best_name, best.return_pct());
    }

    if let Some((worst_name, worst)) = results
        .iter()
        .min_by(|a, b| a.1.return_pct().total_cmp(&b.1.return_pct()))
    {
        println!("⚠️  Worst Scenario: {} ({:+.2}%)", worst_name, worst.return_pct());
    }

    let total_trades: usize = results.iter().map(|(_, r)| r.total_trades()).sum();
    println!("\n📊 Total Trades Across All Scenarios: {}", total_trades);
    println!("\n═══════════════════════════════════════════════════════\n");
}
