//! Error types for the reward session engine

use thiserror::Error;

use crate::engine::SessionId;
use crate::geometry::GeometryError;

/// Catalog validation failure
///
/// Raised once, while a catalog is constructed. A catalog that fails
/// validation must abort startup; none of these can surface per call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Duplicate catalog id: {0}")]
    DuplicateId(String),

    #[error("Offer {offer} references unknown reward {reward}")]
    UnknownReward { offer: String, reward: String },

    #[error("Offer {offer} cannot grant wheel prize {reward}")]
    WheelPrizeOffer { offer: String, reward: String },

    #[error("Offer {0} has zero duration")]
    ZeroDuration(String),

    #[error("Invalid weight {weight} for {id}")]
    InvalidWeight { id: String, weight: f64 },

    #[error("Catalog declares no wheel prizes")]
    NoWheelPrizes,

    #[error("Total wheel prize weight must be positive")]
    ZeroTotalWeight,

    #[error("Total wheel prize weight overflows")]
    TotalWeightOverflow,
}

/// Countdown timer error
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    #[error("A countdown is already running")]
    AlreadyRunning,

    #[error("Invalid countdown: duration {duration_ms}ms, tick interval {tick_interval_ms}ms")]
    InvalidDuration {
        duration_ms: u64,
        tick_interval_ms: u64,
    },

    #[error("Countdown handle {0} is no longer current")]
    StaleHandle(u64),
}

/// Engine error returned to callers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewardError {
    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Another session is in progress")]
    SessionInProgress,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No eligible wheel prize to choose from")]
    EmptyCatalog,

    #[error("Session {0} result was already consumed")]
    SessionAlreadyConsumed(SessionId),

    #[error("Session {0} result expired before it was polled")]
    ResultExpired(SessionId),

    #[error("Unknown session {0}")]
    UnknownSession(SessionId),

    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("Wheel geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

/// Result type alias
pub type RewardResult<T> = Result<T, RewardError>;
