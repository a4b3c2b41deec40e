use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use validator::Validate;

pub mod auction;
pub use auction::AuctionConfig;

/// Runtime configuration of the simulation driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    /// Participants registered automatically at start-up
    pub participants: Vec<String>,

    /// Wall-clock seconds per simulated tick (default: 1.0)
    #[validate(range(exclusive_min = 0.0))]
    pub rt_step_duration_s: f64,

    /// Registration warm-up before the first tick (default: 5.0)
    #[validate(range(min = 0.0))]
    pub rt_step_init_delay_s: f64,

    /// Driver skips ticks while paused (default: false)
    pub pause: bool,

    /// Driver stops ticking after this many steps (default: 96)
    #[validate(range(min = 1))]
    pub max_steps: u64,

    /// Registration stays open for the whole run (default: false)
    pub test_mode: bool,

    /// Simulated seconds per tick (default: 900)
    #[validate(range(min = 1))]
    pub step_size_s: i64,

    #[validate(nested)]
    pub auction: AuctionConfig,

    /// Random bidding agents started by the binary (default: 0)
    #[validate(range(max = 1000))]
    pub virtual_bidders: u32,

    /// Where the binary restores from and persists to
    pub snapshot_path: Option<String>,

    /// Install the Prometheus recorder (default: false)
    pub metrics_enabled: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            participants: Vec::new(),
            rt_step_duration_s: 1.0,
            rt_step_init_delay_s: 5.0,
            pause: false,
            max_steps: 96,
            test_mode: false,
            step_size_s: 900,
            auction: AuctionConfig::default(),
            virtual_bidders: 0,
            snapshot_path: None,
            metrics_enabled: false,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from `MARKET_*` environment variables with defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = env::var("MARKET_PARTICIPANTS") {
            config.participants = val
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        config.rt_step_duration_s = parse_var("MARKET_RT_STEP_DURATION_S", config.rt_step_duration_s);
        config.rt_step_init_delay_s =
            parse_var("MARKET_RT_STEP_INIT_DELAY_S", config.rt_step_init_delay_s);
        config.pause = parse_var("MARKET_PAUSE", config.pause);
        config.max_steps = parse_var("MARKET_MAX_STEPS", config.max_steps);
        config.test_mode = parse_var("MARKET_TEST_MODE", config.test_mode);
        config.step_size_s = parse_var("MARKET_STEP_SIZE_S", config.step_size_s);
        config.virtual_bidders = parse_var("MARKET_VIRTUAL_BIDDERS", config.virtual_bidders);
        config.metrics_enabled = parse_var("MARKET_METRICS_ENABLED", config.metrics_enabled);
        config.snapshot_path = env::var("MARKET_SNAPSHOT_PATH").ok().filter(|p| !p.is_empty());

        if let Ok(val) = env::var("MARKET_PRODUCT_TYPE") {
            config.auction.product_type = val;
        }
        config.auction.minimum_order_amount_kw = parse_var(
            "MARKET_MINIMUM_ORDER_AMOUNT_KW",
            config.auction.minimum_order_amount_kw,
        );

        config.check()?;
        info!(
            participants = config.participants.len(),
            step_size_s = config.step_size_s,
            max_steps = config.max_steps,
            "Loaded simulation configuration from environment"
        );
        Ok(config)
    }

    /// Layer a JSON/TOML/YAML file under `MARKET__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix("MARKET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("participants"),
            )
            .build()
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        config.check()?;
        info!(path = %path.display(), "Loaded simulation configuration from file");
        Ok(config)
    }

    /// Validate field ranges and the auction windows
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        if self.auction.supply_duration_s < self.step_size_s {
            warn!(
                supply_duration_s = self.auction.supply_duration_s,
                step_size_s = self.step_size_s,
                "Supply window is shorter than a tick; some ticks will not be settled"
            );
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => match val.trim().parse::<T>() {
            Ok(parsed) => {
                info!("Using custom {}: {}", name, parsed);
                parsed
            }
            Err(_) => {
                warn!("Failed to parse {}: {}, using default {}", name, val, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}
