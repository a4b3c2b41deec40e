pub mod account;
pub mod auction;
pub mod requests;
pub mod unit;

pub use account::Transaction;
pub use auction::{
    AuctionId, AuctionParameters, AuctionResult, AuctionStatus, AuctionSummary, AwardedOrder,
    Order,
};
pub use requests::{
    AwardedOrdersView, GroupOrderRequest, OrderRequest, Registration, RegistrationRequest,
};
pub use unit::{
    BatteryInformation, DemandInformation, PvInformation, StrategyKind, UnitInformation, UnitInput,
    UnitResult, VppInformation,
};
