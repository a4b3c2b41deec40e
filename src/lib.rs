pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::SimulationConfig;
pub use error::{MarketError, Result};
pub use services::{SimulationController, SimulationDriver, SimulationHandle};
