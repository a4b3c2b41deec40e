pub mod actor;
pub mod bidding;
pub mod controller;

pub use actor::{SimulationDriver, SimulationHandle};
pub use bidding::{spawn_virtual_bidders, VirtualBiddingAgent};
pub use controller::{SimulationController, TickReport, UnitPhaseReport};
