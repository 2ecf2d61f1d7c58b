use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady climb with noise
    Uptrend,
    /// Steady decline with noise
    Downtrend,
    /// Mean-reverting chop around the start price
    Sideways,
    /// Large swings in both directions
    Volatile,
    /// Calm market, then a sharp multi-step drop halfway through
    Crash,
}

impl MarketScenario {
    pub fn all() -> [MarketScenario; 5] {
        [
            MarketScenario::Uptrend,
            MarketScenario::Downtrend,
            MarketScenario::Sideways,
            MarketScenario::Volatile,
            MarketScenario::Crash,
        ]
    }
}

/// Generates synthetic price series for backtesting
pub struct SyntheticPriceGenerator {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticPriceGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// One price per poll, all strictly positive
    pub fn generate(&mut self, scenario: MarketScenario, num_samples: usize) -> Vec<f64> {
        let mut prices = Vec::with_capacity(num_samples);
        let mut price = self.base_price;
        let crash_start = num_samples / 2;

        for i in 0..num_samples {
            price = match scenario {
                MarketScenario::Uptrend => price * (1.0 + 0.002 + self.noise(0.005)),
                MarketScenario::Downtrend => price * (1.0 - 0.002 + self.noise(0.005)),
                MarketScenario::Sideways => {
                    // Pull 10% of the gap back toward the start price each step
                    let pull = (self.base_price - price) * 0.1;
                    price + pull + price * self.noise(0.01)
                }
                MarketScenario::Volatile => price * (1.0 + self.noise(0.05)),
                MarketScenario::Crash => {
                    if (crash_start..crash_start + 3).contains(&i) {
                        price * 0.94
                    } else {
                        price * (1.0 + self.noise(0.004))
                    }
                }
            };
            price = price.max(0.01);
            prices.push(price);
        }

        prices
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        self.rng.gen_range(-amplitude..amplitude)
    }
}
