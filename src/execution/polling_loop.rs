use tokio::sync::watch;
use tokio::time::sleep;

use crate::api::{BalanceSource, PriceSource, SwapExecutor};
use crate::config::{BotConfig, PairConfig};
use crate::error::BotError;
use crate::execution::retry::{Disposition, RetryPolicy};
use crate::execution::swap_logger::TradeLog;
use crate::execution::{PriceWindow, WindowPhase};
use crate::models::{Balances, SwapLogRecord, SwapReceipt, SwapStatus, TradeIntent, TradingMode};
use crate::strategy::{Decision, DecisionEngine};
use crate::Result;

/// What happened in one completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub price: f64,
    pub phase: WindowPhase,
    /// None while the window is warming up
    pub decision: Option<Decision>,
    pub receipt: Option<SwapReceipt>,
    pub mode: TradingMode,
}

/// Fetch, decide, dispatch, log, sleep; one cycle at a time
///
/// A cycle stages the new price into a copy of the window. The window and the
/// trading mode are only committed when the whole cycle succeeds, so a failed
/// cycle leaves no trace besides the FAILED audit record of a failed swap.
pub struct PollingLoop<P, B, S, L> {
    price_source: P,
    balance_source: B,
    executor: S,
    log: L,
    pair: PairConfig,
    dry_run: bool,
    window: PriceWindow,
    engine: DecisionEngine,
    retry: RetryPolicy,
}

impl<P, B, S, L> PollingLoop<P, B, S, L>
where
    P: PriceSource,
    B: BalanceSource,
    S: SwapExecutor,
    L: TradeLog,
{
    pub fn new(config: &BotConfig, price_source: P, balance_source: B, executor: S, log: L) -> Self {
        Self {
            price_source,
            balance_source,
            executor,
            log,
            pair: config.pair.clone(),
            dry_run: config.execution.dry_run,
            window: PriceWindow::from_config(&config.window),
            engine: DecisionEngine::new(config.strategy.clone()),
            retry: RetryPolicy::from_config(&config.polling),
        }
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn mode(&self) -> TradingMode {
        self.engine.mode()
    }

    pub fn executor(&self) -> &S {
        &self.executor
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Run cycles until `shutdown` turns true or its sender goes away
    ///
    /// Shutdown is honoured between cycles only, never in the middle of one.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            "🔄 Polling {}/{} ({} mode)",
            self.pair.base.symbol,
            self.pair.quote.symbol,
            if self.dry_run { "dry-run" } else { "live" }
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.run_cycle().await {
                Ok(_) => self.window.current_interval(),
                Err(e) => match self.retry.classify(&e) {
                    Disposition::Retry(backoff) => {
                        tracing::warn!("Cycle failed: {}. Retrying in {:?}", e, backoff);
                        backoff
                    }
                    Disposition::Fatal => {
                        tracing::error!("Cycle failed fatally: {}", e);
                        return Err(e);
                    }
                },
            };

            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Polling loop stopped");
        Ok(())
    }

    /// One full cycle
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let price = self.price_source.fetch_price().await?;
        tracing::info!(
            "Current {} price: {:.4} {} (flag {})",
            self.pair.base.symbol,
            price,
            self.pair.quote.symbol,
            self.engine.mode().as_flag()
        );

        let mut staged = self.window.clone();
        staged.add_price(price);

        if !staged.is_ready_for_trading() {
            tracing::info!(
                "    → Collecting data... ({}/{} needed)",
                staged.len(),
                staged.capacity()
            );
            self.window = staged;
            return Ok(CycleReport {
                price,
                phase: self.window.phase(),
                decision: None,
                receipt: None,
                mode: self.engine.mode(),
            });
        }

        let balances = self.fetch_balances().await?;
        let decision = self.engine.decide(&staged, price, balances)?;

        if let Some(thresholds) = decision.thresholds {
            tracing::info!(
                "  Buy threshold: {:.4} | Sell threshold: {:.4}",
                thresholds.buy,
                thresholds.sell
            );
        }
        tracing::info!("  Decision: {:?} - {}", decision.action, decision.reason);

        let receipt = match decision.intent() {
            Some(intent) => Some(self.dispatch(intent).await?),
            None => None,
        };

        self.window = staged;
        if let Some(intent) = decision.intent() {
            self.engine.record_execution(intent);
        }

        Ok(CycleReport {
            price,
            phase: self.window.phase(),
            decision: Some(decision),
            receipt,
            mode: self.engine.mode(),
        })
    }

    async fn fetch_balances(&self) -> Result<Balances> {
        let base = self.balance_source.get_balance(&self.pair.base).await?;
        let quote = self.balance_source.get_balance(&self.pair.quote).await?;

        tracing::info!(
            "  Balances: {:.4} {} | {:.2} {}",
            base,
            self.pair.base.symbol,
            quote,
            self.pair.quote.symbol
        );

        Ok(Balances { base, quote })
    }

    /// Send the intent and write exactly one audit record for it
    async fn dispatch(&self, intent: &TradeIntent) -> Result<SwapReceipt> {
        tracing::info!(
            "  → {} {:.6} @ {:.4}",
            intent.direction,
            intent.amount,
            intent.reference_price
        );

        let result = if self.dry_run {
            self.executor.simulate(intent).await
        } else {
            self.executor.execute(intent).await
        };

        match result {
            Ok(receipt) if receipt.status == SwapStatus::Failed => {
                self.log.append(&SwapLogRecord::new(
                    intent,
                    receipt.transaction_id.clone(),
                    SwapStatus::Failed,
                ));
                Err(BotError::SwapRejected {
                    direction: intent.direction,
                    message: match receipt.transaction_id {
                        Some(tx) => format!("Executor reported failure for {}", tx),
                        None => "Executor reported failure".to_string(),
                    },
                })
            }
            Ok(receipt) => {
                self.log.append(&SwapLogRecord::new(
                    intent,
                    receipt.transaction_id.clone(),
                    receipt.status,
                ));
                match &receipt.transaction_id {
                    Some(tx) => tracing::info!("  ✓ Swap {:?}: {}", receipt.status, tx),
                    None => tracing::info!("  ✓ Swap {:?}", receipt.status),
                }
                Ok(receipt)
            }
            Err(e) => {
                tracing::error!("  ✗ Swap failed: {}", e);
                self.log.append(&SwapLogRecord::failed(intent));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorKind;
    use crate::execution::{MemorySwapLog, PaperWallet};
    use crate::models::{SwapType, TradeDirection};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Replays scripted prices, `None` entries fail
    struct ScriptedPrices {
        prices: Mutex<VecDeque<Option<f64>>>,
    }

    impl ScriptedPrices {
        fn new(prices: Vec<Option<f64>>) -> Self {
            Self {
                prices: Mutex::new(prices.into()),
            }
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedPrices {
        async fn fetch_price(&self) -> Result<f64> {
            match self.prices.lock().unwrap().pop_front() {
                Some(Some(price)) => Ok(price),
                _ => Err(BotError::transient(CollaboratorKind::Price, "no quote")),
            }
        }
    }

    struct UnreachableBalances;

    #[async_trait]
    impl BalanceSource for UnreachableBalances {
        async fn get_balance(&self, _token: &crate::models::Token) -> Result<f64> {
            Err(BotError::transient(CollaboratorKind::Balance, "rpc down"))
        }
    }

    /// Answers every swap with a FAILED receipt
    struct RejectingExecutor;

    #[async_trait]
    impl SwapExecutor for RejectingExecutor {
        async fn execute(&self, _intent: &TradeIntent) -> Result<SwapReceipt> {
            Ok(SwapReceipt {
                transaction_id: Some("tx1".to_string()),
                status: SwapStatus::Failed,
                out_amount: None,
            })
        }

        async fn simulate(&self, intent: &TradeIntent) -> Result<SwapReceipt> {
            self.execute(intent).await
        }
    }

    fn config(capacity: usize) -> BotConfig {
        let mut config = BotConfig::default();
        config.window.capacity = capacity;
        config.execution.dry_run = false;
        config
    }

    fn paper(base: f64, quote: f64) -> Arc<PaperWallet> {
        let pair = PairConfig::default();
        Arc::new(PaperWallet::new(pair.base, pair.quote, Balances { base, quote }))
    }

    fn bot(
        capacity: usize,
        prices: Vec<Option<f64>>,
        wallet: Arc<PaperWallet>,
    ) -> PollingLoop<ScriptedPrices, Arc<PaperWallet>, Arc<PaperWallet>, Arc<MemorySwapLog>> {
        PollingLoop::new(
            &config(capacity),
            ScriptedPrices::new(prices),
            wallet.clone(),
            wallet,
            Arc::new(MemorySwapLog::new()),
        )
    }

    #[tokio::test]
    async fn test_warmup_cycles_do_not_trade() {
        let wallet = paper(0.0, 100.0);
        let mut bot = bot(3, vec![Some(100.0), Some(101.0)], wallet);

        let report = bot.run_cycle().await.unwrap();
        assert_eq!(report.phase, WindowPhase::Warming);
        assert!(report.decision.is_none());

        bot.run_cycle().await.unwrap();
        assert_eq!(bot.window().len(), 2);
        assert!(bot.log().records().is_empty());
    }

    #[tokio::test]
    async fn test_price_failure_leaves_window_untouched() {
        let wallet = paper(0.0, 100.0);
        let mut bot = bot(3, vec![Some(100.0), None], wallet);

        bot.run_cycle().await.unwrap();
        let err = bot.run_cycle().await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(bot.window().prices(), vec![100.0]);
    }

    #[tokio::test]
    async fn test_buy_commits_window_and_mode() {
        let wallet = paper(0.0, 100.0);
        let mut bot = bot(3, vec![Some(100.0), Some(100.0), Some(90.0)], wallet.clone());

        bot.run_cycle().await.unwrap();
        bot.run_cycle().await.unwrap();
        let report = bot.run_cycle().await.unwrap();

        assert_eq!(report.phase, WindowPhase::Ready);
        assert_eq!(report.receipt.unwrap().status, SwapStatus::Success);
        assert_eq!(bot.mode(), TradingMode::AfterBuy);
        assert_eq!(bot.window().len(), 3);

        let records = bot.log().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].swap_type, SwapType::Buy);
        assert!((records[0].amount - 70.0).abs() < 1e-9);
        assert!((wallet.balances().quote - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_swap_logs_and_rolls_back() {
        let wallet = paper(0.0, 100.0);
        let mut bot = bot(3, vec![Some(100.0), Some(100.0), Some(90.0)], wallet.clone());

        bot.run_cycle().await.unwrap();
        bot.run_cycle().await.unwrap();
        wallet.fail_next(1);
        let err = bot.run_cycle().await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(bot.mode(), TradingMode::Initial);
        assert_eq!(bot.window().prices(), vec![100.0, 100.0]);

        let records = bot.log().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SwapStatus::Failed);
        assert_eq!(records[0].swap_type, SwapType::Buy);
    }

    #[tokio::test]
    async fn test_dry_run_simulates() {
        let wallet = paper(0.0, 100.0);
        let mut config = config(2);
        config.execution.dry_run = true;
        let mut bot = PollingLoop::new(
            &config,
            ScriptedPrices::new(vec![Some(100.0), Some(100.0)]),
            wallet.clone(),
            wallet.clone(),
            Arc::new(MemorySwapLog::new()),
        );

        bot.run_cycle().await.unwrap();
        let report = bot.run_cycle().await.unwrap();

        // Flat window: price sits on the buy threshold
        assert_eq!(report.receipt.unwrap().status, SwapStatus::Simulated);
        assert_eq!(bot.mode(), TradingMode::AfterBuy);
        assert_eq!(wallet.balances().quote, 100.0);
        assert_eq!(bot.log().records()[0].status, SwapStatus::Simulated);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let wallet = paper(0.0, 100.0);
        let mut config = config(2);
        config.window.warmup_interval_secs = 3600;
        let mut bot = PollingLoop::new(
            &config,
            ScriptedPrices::new(vec![Some(100.0); 10]),
            wallet.clone(),
            wallet,
            Arc::new(MemorySwapLog::new()),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            bot.run(rx).await.map(|_| bot.window().len())
        });

        // First cycle runs, then the loop parks in its hour-long sleep
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let len = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop should stop promptly")
            .unwrap()
            .unwrap();
        assert_eq!(len, 1);
    }

    #[tokio::test]
    async fn test_run_retries_after_backoff() {
        let wallet = paper(0.0, 100.0);
        let mut config = config(3);
        config.polling.error_backoff_secs = 0;
        config.window.warmup_interval_secs = 3600;
        let mut bot = PollingLoop::new(
            &config,
            ScriptedPrices::new(vec![None, None, Some(100.0)]),
            wallet.clone(),
            wallet,
            Arc::new(MemorySwapLog::new()),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            bot.run(rx).await.map(|_| bot.window().prices())
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let prices = handle.await.unwrap().unwrap();
        assert_eq!(prices, vec![100.0]);
    }

    #[tokio::test]
    async fn test_emergency_sell_keeps_mode() {
        let wallet = paper(0.0, 1000.0);
        let mut bot = bot(
            3,
            vec![Some(110.0), Some(110.0), Some(100.0), Some(90.0)],
            wallet.clone(),
        );

        bot.run_cycle().await.unwrap();
        bot.run_cycle().await.unwrap();
        let report = bot.run_cycle().await.unwrap();
        assert_eq!(
            report.decision.unwrap().intent().unwrap().direction,
            TradeDirection::Buy
        );
        assert_eq!(bot.mode(), TradingMode::AfterBuy);

        // 100 -> 90 is a 10 drop while holding base
        let report = bot.run_cycle().await.unwrap();
        assert_eq!(
            report.decision.unwrap().intent().unwrap().direction,
            TradeDirection::EmergencySell
        );
        assert_eq!(bot.mode(), TradingMode::AfterBuy);
        assert_eq!(bot.log().records().len(), 2);
    }

    #[tokio::test]
    async fn test_balance_failure_abandons_first_ready_cycle() {
        let mut bot = PollingLoop::new(
            &config(3),
            ScriptedPrices::new(vec![Some(100.0), Some(100.0), Some(90.0)]),
            UnreachableBalances,
            paper(0.0, 100.0),
            Arc::new(MemorySwapLog::new()),
        );

        bot.run_cycle().await.unwrap();
        bot.run_cycle().await.unwrap();
        let err = bot.run_cycle().await.unwrap_err();

        assert!(matches!(
            err,
            BotError::Transient {
                kind: CollaboratorKind::Balance,
                ..
            }
        ));
        assert!(err.is_transient());
        assert_eq!(bot.window().len(), 2);
        assert_eq!(bot.mode(), TradingMode::Initial);
        assert!(bot.log().records().is_empty());
    }

    #[tokio::test]
    async fn test_failed_receipt_logs_once_and_rolls_back() {
        let mut bot = PollingLoop::new(
            &config(3),
            ScriptedPrices::new(vec![Some(100.0), Some(100.0), Some(90.0)]),
            paper(0.0, 100.0),
            RejectingExecutor,
            Arc::new(MemorySwapLog::new()),
        );

        bot.run_cycle().await.unwrap();
        bot.run_cycle().await.unwrap();
        let err = bot.run_cycle().await.unwrap_err();

        assert!(matches!(
            err,
            BotError::SwapRejected {
                direction: TradeDirection::Buy,
                ..
            }
        ));
        assert!(err.is_transient());
        assert_eq!(bot.mode(), TradingMode::Initial);
        assert_eq!(bot.window().prices(), vec![100.0, 100.0]);

        let records = bot.log().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SwapStatus::Failed);
        assert_eq!(records[0].swap_type, SwapType::Buy);
        assert_eq!(records[0].transaction_id.as_deref(), Some("tx1"));
    }
}
