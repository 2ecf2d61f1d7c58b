use crate::config::WindowConfig;
use crate::models::PriceSample;
use std::collections::VecDeque;
use std::time::Duration;

/// Warm-up fills the window, steady state slides it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    Warming,
    Ready,
}

/// Bounded FIFO of recent price samples
///
/// Appends until `capacity` samples are held for the first time, then evicts
/// the oldest sample on every insert. The switch to steady state is one-way.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    samples: VecDeque<PriceSample>,
    capacity: usize,
    steady: bool,
    warmup_interval: Duration,
    steady_interval: Duration,
}

impl PriceWindow {
    /// Create an empty window
    ///
    /// # Arguments
    /// * `capacity` - Number of samples kept once steady
    /// * `warmup_interval` - Poll interval while filling
    /// * `steady_interval` - Poll interval once full
    pub fn new(capacity: usize, warmup_interval: Duration, steady_interval: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            steady: false,
            warmup_interval,
            steady_interval,
        }
    }

    pub fn from_config(config: &WindowConfig) -> Self {
        Self::new(
            config.capacity,
            config.warmup_interval(),
            config.steady_interval(),
        )
    }

    /// Record a price observed now
    pub fn add_price(&mut self, price: f64) {
        self.add_sample(PriceSample::now(price));
    }

    pub fn add_sample(&mut self, sample: PriceSample) {
        if self.steady {
            self.samples.pop_front();
            self.samples.push_back(sample);
        } else {
            self.samples.push_back(sample);
            if self.samples.len() >= self.capacity {
                self.steady = true;
                tracing::debug!(capacity = self.capacity, "Price window full, trading enabled");
            }
        }
    }

    /// True iff the window holds exactly `capacity` samples
    pub fn is_ready_for_trading(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn phase(&self) -> WindowPhase {
        if self.steady {
            WindowPhase::Ready
        } else {
            WindowPhase::Warming
        }
    }

    /// Poll interval for the current phase
    pub fn current_interval(&self) -> Duration {
        match self.phase() {
            WindowPhase::Warming => self.warmup_interval,
            WindowPhase::Ready => self.steady_interval,
        }
    }

    /// Copy of the samples, newest last
    pub fn snapshot(&self) -> Vec<PriceSample> {
        self.samples.iter().copied().collect()
    }

    /// Prices only, newest last
    pub fn prices(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.price).collect()
    }

    /// (second newest, newest) when at least two samples exist
    pub fn last_two(&self) -> Option<(f64, f64)> {
        let len = self.samples.len();
        if len < 2 {
            return None;
        }
        Some((self.samples[len - 2].price, self.samples[len - 1].price))
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|s| s.price)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
