use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::auction::AuctionStatus;

pub type Result<T> = std::result::Result<T, MarketError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation errors (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidInput,
    #[serde(rename = "VAL_3002")]
    InvalidAmount,

    // Order errors (31xx)
    #[serde(rename = "ORD_3101")]
    OrderBelowMinimum,
    #[serde(rename = "ORD_3102")]
    AuctionNotOpen,

    // Resource errors (4xxx)
    #[serde(rename = "RES_4001")]
    AuctionNotFound,
    #[serde(rename = "RES_4002")]
    ParticipantNotFound,
    #[serde(rename = "RES_4003")]
    AlreadyRegistered,
    #[serde(rename = "RES_4004")]
    AuctionConflict,

    // Business logic errors (5xxx)
    #[serde(rename = "BIZ_5001")]
    RegistrationClosed,

    // Storage errors (7xxx)
    #[serde(rename = "STO_7001")]
    PersistenceFailed,
    #[serde(rename = "STO_7002")]
    SerializationFailed,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9999")]
    InternalError,
    #[serde(rename = "INT_9998")]
    ConfigurationError,
    #[serde(rename = "INT_9997")]
    InvariantViolation,
    #[serde(rename = "INT_9996")]
    SimulationStopped,
    #[serde(rename = "INT_9995")]
    TimeRewind,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 3001,
            ErrorCode::InvalidAmount => 3002,
            ErrorCode::OrderBelowMinimum => 3101,
            ErrorCode::AuctionNotOpen => 3102,
            ErrorCode::AuctionNotFound => 4001,
            ErrorCode::ParticipantNotFound => 4002,
            ErrorCode::AlreadyRegistered => 4003,
            ErrorCode::AuctionConflict => 4004,
            ErrorCode::RegistrationClosed => 5001,
            ErrorCode::PersistenceFailed => 7001,
            ErrorCode::SerializationFailed => 7002,
            ErrorCode::InternalError => 9999,
            ErrorCode::ConfigurationError => 9998,
            ErrorCode::InvariantViolation => 9997,
            ErrorCode::SimulationStopped => 9996,
            ErrorCode::TimeRewind => 9995,
        }
    }

    /// Get user-friendly message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "The request contains invalid input",
            ErrorCode::InvalidAmount => "The amount is invalid",
            ErrorCode::OrderBelowMinimum => "The order amount is below the auction minimum",
            ErrorCode::AuctionNotOpen => "The auction is not accepting orders",
            ErrorCode::AuctionNotFound => "No auction matches the requested supply time",
            ErrorCode::ParticipantNotFound => "The participant is not registered",
            ErrorCode::AlreadyRegistered => "The participant is already registered",
            ErrorCode::AuctionConflict => "An auction for this supply slot already exists",
            ErrorCode::RegistrationClosed => "Registration is closed",
            ErrorCode::TimeRewind => "A unit cannot be stepped backwards in time",
            ErrorCode::PersistenceFailed => "Failed to persist simulation state",
            ErrorCode::SerializationFailed => "Failed to (de)serialize simulation state",
            ErrorCode::InternalError => "An internal error occurred",
            ErrorCode::ConfigurationError => "The configuration is invalid",
            ErrorCode::InvariantViolation => "An internal consistency check failed",
            ErrorCode::SimulationStopped => "The simulation is not running",
        }
    }
}

/// Serializable error payload for request-facing transports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Order of {amount_kw} kW is below the minimum order amount of {minimum_kw} kW")]
    OrderBelowMinimum {
        amount_kw: Decimal,
        minimum_kw: Decimal,
    },

    #[error("Auction {auction_id} is not open (status: {status})")]
    AuctionNotOpen {
        auction_id: Uuid,
        status: AuctionStatus,
    },

    #[error("No live auction for supply time {supply_time} and product '{product_type}'")]
    AuctionNotFound {
        supply_time: i64,
        product_type: String,
    },

    #[error("Auction {0} not found")]
    UnknownAuction(Uuid),

    #[error("A live auction already covers supply time {supply_time} for product '{product_type}'")]
    AuctionConflict {
        supply_time: i64,
        product_type: String,
    },

    #[error("Participant '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Unit '{unit_id}' cannot step from index {last_step} back to {requested_step}")]
    TimeRewind {
        unit_id: String,
        last_step: usize,
        requested_step: usize,
    },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Simulation is not running")]
    SimulationStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Create a validation error for malformed input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        MarketError::Validation(message.into())
    }

    /// Create an invariant violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        MarketError::InvariantViolation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MarketError::Internal(message.into())
    }

    /// Map the error onto its machine-checkable reason code
    pub fn code(&self) -> ErrorCode {
        match self {
            MarketError::Validation(_) => ErrorCode::InvalidInput,
            MarketError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            MarketError::OrderBelowMinimum { .. } => ErrorCode::OrderBelowMinimum,
            MarketError::AuctionNotOpen { .. } => ErrorCode::AuctionNotOpen,
            MarketError::AuctionNotFound { .. } | MarketError::UnknownAuction(_) => {
                ErrorCode::AuctionNotFound
            }
            MarketError::AuctionConflict { .. } => ErrorCode::AuctionConflict,
            MarketError::AlreadyRegistered(_) => ErrorCode::AlreadyRegistered,
            MarketError::RegistrationClosed => ErrorCode::RegistrationClosed,
            MarketError::UnknownParticipant(_) => ErrorCode::ParticipantNotFound,
            MarketError::TimeRewind { .. } => ErrorCode::TimeRewind,
            MarketError::InvariantViolation(_) => ErrorCode::InvariantViolation,
            MarketError::Configuration(_) => ErrorCode::ConfigurationError,
            MarketError::Persistence(_) => ErrorCode::PersistenceFailed,
            MarketError::Serialization(_) => ErrorCode::SerializationFailed,
            MarketError::SimulationStopped => ErrorCode::SimulationStopped,
            MarketError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Rejected input from a participant, as opposed to a fault of the simulator
    pub fn is_rejection(&self) -> bool {
        matches!(self.code().code(), 3000..=5999)
    }

    /// Log at `warn` for rejections and `error` for everything else
    pub fn log(&self) {
        if self.is_rejection() {
            warn!(code = ?self.code(), "Request rejected: {}", self);
        } else {
            error!(code = ?self.code(), "Simulation error: {}", self);
        }
    }

    pub fn to_detail(&self) -> ErrorDetail {
        let code = self.code();
        ErrorDetail {
            code,
            code_number: code.code(),
            message: self.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl From<validator::ValidationErrors> for MarketError {
    fn from(err: validator::ValidationErrors) -> Self {
        MarketError::Validation(err.to_string())
    }
}

impl From<crate::config::ConfigError> for MarketError {
    fn from(err: crate::config::ConfigError) -> Self {
        MarketError::Configuration(err.to_string())
    }
}
