// Price window, polling loop and the pieces it dispatches to
pub mod paper_wallet;
pub mod polling_loop;
pub mod price_window;
pub mod retry;
pub mod swap_logger;

pub use paper_wallet::PaperWallet;
pub use polling_loop::{CycleReport, PollingLoop};
pub use price_window::{PriceWindow, WindowPhase};
pub use retry::{Disposition, RetryPolicy};
pub use swap_logger::{CsvSwapLogger, MemorySwapLog, TradeLog};
