//! # se-reward — Reward Session Engine for the Spin & Earn dashboard
//!
//! Runs the timed reward flows of the dashboard: watching an ad offer to earn
//! a bonus, and spinning the prize wheel. Every session's reward is decided
//! the moment the session starts; the countdown only gates when it is
//! released.
//!
//! ## Features
//!
//! - **Reward Catalog**: Ad offers and wheel prizes with weights and eligibility rules
//! - **Outcome Resolver**: Weighted random prize selection with injected randomness
//! - **Wheel Geometry**: Segment layout and landing rotations for the wheel animation
//! - **Session Timer**: Sampled countdowns with fixed-cadence progress
//! - **Session Engine**: One session at a time, results emitted at most once
//!
//! ## Architecture
//!
//! ```text
//! RewardSessionEngine
//!     │
//!     ├── RewardCatalog (offers, prizes, eligibility)
//!     ├── resolver (weighted prize draw)
//!     ├── geometry (segment → target rotation)
//!     └── SessionTimer ← Clock (monotonic / manual)
//!           │
//!           v
//!     poll() → ProgressTick … → SessionResult (once)
//!
//! SessionTicker ──tick()──▶ RewardSessionEngine   (background thread)
//! ```

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod resolver;
pub mod ticker;
pub mod timer;

pub use catalog::*;
pub use clock::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use ticker::*;
pub use timer::*;
