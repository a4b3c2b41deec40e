// Simulation services
// Market clearing, settlement, dispatch, ledgers and the driver loop

pub mod dispatch;
pub mod general_demand;
pub mod ledger;
pub mod market_clearing;
pub mod persistence;
pub mod settlement;
pub mod simulation;

pub use dispatch::{Resource, UnitPool, Vpp};
pub use general_demand::GeneralDemand;
pub use ledger::{Account, AccountStore};
pub use market_clearing::{Auction, Market, MarketInputs};
pub use persistence::{JsonPersistenceHandler, PersistenceHandler, SimulationSnapshot};
pub use settlement::{Accounter, SettlementService};
pub use simulation::{SimulationController, SimulationDriver, SimulationHandle};
