//! Simulation and network configuration.

use thiserror::Error;

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("at least one validator is required")]
    NoValidators,

    #[error("{name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("delay_min ({min}) exceeds delay_max ({max})")]
    DelayRange { min: u64, max: u64 },

    #[error("token bucket needs a positive rate and a capacity of at least 1 (rate {rate}, capacity {capacity})")]
    InvalidBucket { rate: f64, capacity: f64 },

    #[error("body_defer_ticks must be at least 1")]
    ZeroDeferInterval,
}

/// Fault model of the simulated network. Times are in ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Probability that a sent message is lost.
    pub drop_probability: f64,
    /// Probability that a sent message is delivered a second time, one tick later.
    pub duplicate_probability: f64,
    /// Minimum delivery delay.
    pub delay_min: u64,
    /// Maximum delivery delay (inclusive).
    pub delay_max: u64,
    /// Tokens added per tick to each link's bucket.
    pub bucket_rate: f64,
    /// Maximum tokens per link. Buckets start full.
    pub bucket_capacity: f64,
    /// How long a link stays blocked after running out of tokens.
    pub block_cooldown: u64,
    /// How far a body is pushed back while its header is missing.
    pub body_defer_ticks: u64,
    /// How long after the first deferral a body is dropped.
    pub body_defer_deadline: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            drop_probability: 0.05,
            duplicate_probability: 0.05,
            delay_min: 0,
            delay_max: 5,
            bucket_rate: 1.0,
            bucket_capacity: 10.0,
            block_cooldown: 10,
            body_defer_ticks: 2,
            body_defer_deadline: 20,
        }
    }
}

impl NetworkConfig {
    /// No loss and no duplication. Delay and rate limiting keep their defaults.
    pub fn reliable() -> Self {
        Self {
            drop_probability: 0.0,
            duplicate_probability: 0.0,
            ..Self::default()
        }
    }

    pub fn with_drop_probability(mut self, p: f64) -> Self {
        self.drop_probability = p;
        self
    }

    pub fn with_duplicate_probability(mut self, p: f64) -> Self {
        self.duplicate_probability = p;
        self
    }

    pub fn with_delay(mut self, min: u64, max: u64) -> Self {
        self.delay_min = min;
        self.delay_max = max;
        self
    }

    pub fn with_bucket(mut self, rate: f64, capacity: f64) -> Self {
        self.bucket_rate = rate;
        self.bucket_capacity = capacity;
        self
    }

    pub fn with_block_cooldown(mut self, ticks: u64) -> Self {
        self.block_cooldown = ticks;
        self
    }

    pub fn with_body_deferral(mut self, ticks: u64, deadline: u64) -> Self {
        self.body_defer_ticks = ticks;
        self.body_defer_deadline = deadline;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("drop_probability", self.drop_probability),
            ("duplicate_probability", self.duplicate_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { name, value });
            }
        }
        if self.delay_min > self.delay_max {
            return Err(ConfigError::DelayRange {
                min: self.delay_min,
                max: self.delay_max,
            });
        }
        if !(self.bucket_rate.is_finite() && self.bucket_rate > 0.0)
            || !(self.bucket_capacity.is_finite() && self.bucket_capacity >= 1.0)
        {
            return Err(ConfigError::InvalidBucket {
                rate: self.bucket_rate,
                capacity: self.bucket_capacity,
            });
        }
        if self.body_defer_ticks == 0 {
            return Err(ConfigError::ZeroDeferInterval);
        }
        Ok(())
    }
}

/// Parameters of one simulation run. Fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub num_validators: usize,
    pub seed: u64,
    /// Last height the driver proposes.
    pub target_height: u64,
    /// Transactions generated per proposed block.
    pub txs_per_block: usize,
    pub network: NetworkConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_validators: 4,
            seed: 42,
            target_height: 3,
            txs_per_block: 0,
            network: NetworkConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new(num_validators: usize, seed: u64) -> Self {
        Self {
            num_validators,
            seed,
            ..Self::default()
        }
    }

    pub fn with_target_height(mut self, height: u64) -> Self {
        self.target_height = height;
        self
    }

    pub fn with_txs_per_block(mut self, txs: usize) -> Self {
        self.txs_per_block = txs;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_validators == 0 {
            return Err(ConfigError::NoValidators);
        }
        self.network.validate()
    }
}
