use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::SecondsFormat;

use crate::error::BotError;
use crate::models::{SwapLogRecord, SwapStatus, SwapType};
use crate::Result;

const HEADER: [&str; 6] = ["timestamp", "type", "amount", "price", "transactionId", "status"];

/// Append-only audit trail of attempted swaps
///
/// Never fails on the hot path: implementations report their own errors.
pub trait TradeLog: Send + Sync {
    fn append(&self, record: &SwapLogRecord);
}

impl<T: TradeLog + ?Sized> TradeLog for Arc<T> {
    fn append(&self, record: &SwapLogRecord) {
        (**self).append(record)
    }
}

/// CSV file logger
pub struct CsvSwapLogger {
    path: PathBuf,
    // Serializes appends from clones sharing the file
    lock: Mutex<()>,
}

impl CsvSwapLogger {
    /// Open (or create) the log, writing the header when the file is new or empty
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        if file.metadata()?.len() == 0 {
            let mut writer = csv::Writer::from_writer(file);
            writer
                .write_record(HEADER)
                .map_err(|e| BotError::Config(e.to_string()))?;
            writer.flush()?;
        }

        tracing::info!("Swap log at {}", path.display());

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &SwapLogRecord) -> std::result::Result<(), csv::Error> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer.write_record([
            record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            swap_type_label(record.swap_type).to_string(),
            record.amount.to_string(),
            record.price.to_string(),
            record.transaction_id.clone().unwrap_or_default(),
            status_label(record.status).to_string(),
        ])?;
        writer.flush()?;
        Ok(())
    }
}

impl TradeLog for CsvSwapLogger {
    fn append(&self, record: &SwapLogRecord) {
        if let Err(e) = self.write(record) {
            tracing::error!(
                "Failed to append {:?} swap record to {}: {}",
                record.swap_type,
                self.path.display(),
                e
            );
        }
    }
}

fn swap_type_label(swap_type: SwapType) -> &'static str {
    match swap_type {
        SwapType::Buy => "BUY",
        SwapType::Sell => "SELL",
    }
}

fn status_label(status: SwapStatus) -> &'static str {
    match status {
        SwapStatus::Success => "SUCCESS",
        SwapStatus::Failed => "FAILED",
        SwapStatus::Simulated => "SIMULATED",
    }
}

/// In-memory log for backtests and tests
#[derive(Default)]
pub struct MemorySwapLog {
    records: Mutex<Vec<SwapLogRecord>>,
}

impl MemorySwapLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SwapLogRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl TradeLog for MemorySwapLog {
    fn append(&self, record: &SwapLogRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(e) => tracing::error!("Swap log poisoned: {}", e),
        }
    }
}
