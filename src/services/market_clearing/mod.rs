//! Auctions and the market that schedules them.
//!
//! Every tick the market advances each live auction against the simulated
//! clock. An auction accepts orders while its gate is open and is cleared in
//! one batch, in merit order, when the gate closes.

pub mod auction;
pub mod market;

pub use auction::{Auction, OrderContainer};
pub use market::{Market, MarketInputs, MarketStepSummary};
