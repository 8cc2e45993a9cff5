//! Reward Session Engine — ad-watch and spin sessions
//!
//! Orchestrates the catalog, the outcome resolver, wheel geometry and the
//! session timer. The reward of every session is resolved up front, before
//! any progress is observable, and is emitted through [`RewardSessionEngine::poll`]
//! at most once.
//!
//! ## Session lifecycle
//!
//! ```text
//! start_*() ──eligibility──▶ Running ──elapsed ≥ duration──▶ Completed ──poll──▶ result (once)
//!                               │
//!                               └──cancel()──▶ Cancelled (reward discarded)
//! ```
//!
//! ## Thread Safety Design
//!
//! All engine state (the single active-session slot, session records, the
//! wheel rotation accumulator, the RNG) sits behind one mutex. The timer has
//! its own lock, always taken after the engine lock. Share the engine
//! between the UI and a [`SessionTicker`](crate::ticker::SessionTicker) with
//! an `Arc`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{RewardCatalog, RewardCatalogEntry, RewardKind, UserStats};
use crate::clock::{Clock, MonotonicClock};
use crate::config::{ConfigError, EngineConfig};
use crate::error::{RewardError, RewardResult};
use crate::geometry;
use crate::resolver;
use crate::timer::{CancelOutcome, SessionTimer, TimerHandle, TimerProgress, TimerSample};

/// Retired sessions remembered with how they ended
const RETIRED_CAPACITY: usize = 512;

/// Completed results kept waiting for a poll; older ones are dropped
const UNPOLLED_CAPACITY: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{:06}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    AdWatch,
    Spin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Running,
    Completed,
    Cancelled,
}

/// Public view of a session
///
/// The pre-chosen reward is deliberately absent; it only leaves the engine
/// inside a [`SessionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    /// Offer being watched (ad-watch only)
    pub offer_id: Option<String>,
    /// Where the wheel must stop (spin only)
    pub target_rotation_degrees: Option<f64>,
    pub duration_ms: u64,
    pub started_at_ms: u64,
    pub state: SessionState,
}

/// Progress of a running session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressTick {
    pub session_id: SessionId,
    pub elapsed_ms: u64,
    /// In [0, 1]
    pub progress_fraction: f64,
    pub remaining_ms: u64,
}

impl ProgressTick {
    fn from_timer(session_id: SessionId, progress: TimerProgress) -> Self {
        Self {
            session_id,
            elapsed_ms: progress.elapsed_ms,
            progress_fraction: progress.progress_fraction,
            remaining_ms: progress.remaining_ms,
        }
    }

    /// Whole seconds left, rounded up
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms.div_ceil(1000)
    }
}

/// Reward emitted by a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub reward: RewardCatalogEntry,
    /// Final wheel rotation (spin only)
    pub rotation_degrees: Option<f64>,
    /// Segment under the pointer (spin only)
    pub segment_index: Option<usize>,
}

/// Answer to a poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Latest tick; the final tick (fraction 1.0) is returned exactly once
    Progress(ProgressTick),
    /// The reward, returned exactly once
    Completed(SessionResult),
    /// Cancelled before completion; no reward
    Cancelled,
}

/// Engine counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub ad_watches_started: u64,
    pub spins_started: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub results_delivered: u64,
    /// Completed results dropped without ever being polled
    pub results_expired: u64,
    pub rejected_in_progress: u64,
    pub rejected_not_eligible: u64,
    /// Delivered rewards by catalog id
    pub rewards_by_id: BTreeMap<String, u64>,
}

impl EngineStats {
    pub fn sessions_started(&self) -> u64 {
        self.ad_watches_started + self.spins_started
    }

    /// Percentage of finished sessions that completed
    pub fn completion_rate(&self) -> f64 {
        let finished = self.completed + self.cancelled;
        if finished > 0 {
            (self.completed as f64 / finished as f64) * 100.0
        } else {
            0.0
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE STATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct SessionRecord {
    session: Session,
    reward: RewardCatalogEntry,
    segment_index: Option<usize>,
    timer: TimerHandle,
    latest: ProgressTick,
    /// Final tick waiting for the poller
    pending_final: Option<ProgressTick>,
}

impl SessionRecord {
    fn result(&self) -> SessionResult {
        SessionResult {
            session_id: self.session.id,
            kind: self.session.kind,
            reward: self.reward.clone(),
            rotation_degrees: self.session.target_rotation_degrees,
            segment_index: self.segment_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retired {
    Consumed,
    Cancelled,
    /// Completed but evicted before anyone polled it
    Expired,
}

struct EngineState {
    next_id: u64,
    /// The one running session, if any
    active: Option<SessionId>,
    /// Running and completed-but-unpolled sessions
    records: HashMap<SessionId, SessionRecord>,
    retired: HashMap<SessionId, Retired>,
    retired_order: VecDeque<SessionId>,
    /// Accumulated wheel rotation; only ever grows
    rotation: f64,
    rng: Box<dyn RngCore + Send>,
    stats: EngineStats,
}

impl EngineState {
    /// Whether `id` was ever handed out by this engine
    fn issued(&self, id: SessionId) -> bool {
        id.0 >= 1 && id.0 < self.next_id
    }

    fn retire(&mut self, id: SessionId, how: Retired) {
        self.records.remove(&id);
        if self.active == Some(id) {
            self.active = None;
        }
        self.retired.insert(id, how);
        self.retired_order.push_back(id);
        while self.retired_order.len() > RETIRED_CAPACITY {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
    }

    fn complete(&mut self, id: SessionId, final_tick: Option<ProgressTick>) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        record.session.state = SessionState::Completed;
        if let Some(tick) = final_tick {
            record.latest = tick;
            record.pending_final = Some(tick);
        }
        if let Some(target) = record.session.target_rotation_degrees {
            self.rotation = self.rotation.max(target);
        }
        if self.active == Some(id) {
            self.active = None;
        }
        self.stats.completed += 1;
        log::info!("{} completed", id);
        self.expire_unpolled();
    }

    /// Drop the oldest completed results beyond `UNPOLLED_CAPACITY`
    fn expire_unpolled(&mut self) {
        let mut waiting: Vec<SessionId> = self
            .records
            .values()
            .filter(|r| r.session.state == SessionState::Completed)
            .map(|r| r.session.id)
            .collect();
        if waiting.len() <= UNPOLLED_CAPACITY {
            return;
        }
        waiting.sort_unstable();
        let excess = waiting.len() - UNPOLLED_CAPACITY;
        for id in waiting.into_iter().take(excess) {
            self.retire(id, Retired::Expired);
            self.stats.results_expired += 1;
            log::warn!("{} result was never polled; dropped", id);
        }
    }

    fn cancel_record(&mut self, id: SessionId) {
        self.retire(id, Retired::Cancelled);
        self.stats.cancelled += 1;
        log::info!("{} cancelled, reward discarded", id);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs one reward session at a time
pub struct RewardSessionEngine {
    catalog: RewardCatalog,
    config: EngineConfig,
    timer: SessionTimer,
    state: Mutex<EngineState>,
}

impl RewardSessionEngine {
    /// Engine on the wall clock with entropy-seeded randomness
    ///
    /// Fails if `config` does not validate.
    pub fn new(catalog: RewardCatalog, config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_parts(
            catalog,
            config,
            Arc::new(MonotonicClock::new()),
            Box::new(StdRng::from_os_rng()),
        )
    }

    /// Engine with reproducible outcomes
    pub fn seeded(
        catalog: RewardCatalog,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        Self::with_parts(catalog, config, clock, Box::new(ChaCha8Rng::seed_from_u64(seed)))
    }

    /// Engine with an explicit clock and randomness source
    pub fn with_parts(
        catalog: RewardCatalog,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            catalog,
            config,
            timer: SessionTimer::new(clock),
            state: Mutex::new(EngineState {
                next_id: 1,
                active: None,
                records: HashMap::new(),
                retired: HashMap::new(),
                retired_order: VecDeque::new(),
                rotation: 0.0,
                rng,
                stats: EngineStats::default(),
            }),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn catalog(&self) -> &RewardCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Accumulated wheel rotation after the last completed spin
    pub fn wheel_rotation(&self) -> f64 {
        self.state.lock().rotation
    }

    pub fn stats(&self) -> EngineStats {
        self.state.lock().stats.clone()
    }

    /// Snapshot of a running or completed-but-unpolled session
    pub fn session(&self, id: SessionId) -> Option<Session> {
        let mut state = self.state.lock();
        self.advance_active(&mut state);
        state.records.get(&id).map(|r| r.session.clone())
    }

    /// Lifecycle state of any session still remembered by the engine
    pub fn session_state(&self, id: SessionId) -> Option<SessionState> {
        let mut state = self.state.lock();
        self.advance_active(&mut state);
        if let Some(record) = state.records.get(&id) {
            return Some(record.session.state);
        }
        state.retired.get(&id).map(|how| match how {
            Retired::Consumed | Retired::Expired => SessionState::Completed,
            Retired::Cancelled => SessionState::Cancelled,
        })
    }

    /// The running session, if any
    pub fn active_session(&self) -> Option<Session> {
        let mut state = self.state.lock();
        self.advance_active(&mut state);
        let id = state.active?;
        state.records.get(&id).map(|r| r.session.clone())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SESSION START
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start watching an ad offer
    ///
    /// The offer's reward is fixed; nothing is drawn.
    pub fn start_ad_watch(&self, offer_id: &str, stats: &UserStats) -> RewardResult<Session> {
        let mut state = self.state.lock();
        self.ensure_idle(&mut state)?;

        let offer = self.catalog.offer(offer_id)?;
        let reward = self.catalog.offer_reward(offer)?;
        if !reward.is_eligible(stats) {
            state.stats.rejected_not_eligible += 1;
            return Err(RewardError::NotEligible(format!(
                "{}: {}",
                offer.id,
                reward.eligibility.describe()
            )));
        }

        let handle = self.timer.start(offer.duration_ms, self.config.tick_interval_ms)?;
        let session = self.open_session(
            &mut state,
            SessionKind::AdWatch,
            Some(offer.id.clone()),
            reward.clone(),
            None,
            offer.duration_ms,
            handle,
        );
        state.stats.ad_watches_started += 1;
        log::info!(
            "{} watching '{}' for {}ms",
            session.id,
            offer.id,
            offer.duration_ms
        );
        Ok(session)
    }

    /// Start a wheel spin
    ///
    /// The prize is drawn now; the returned session carries the rotation the
    /// wheel must animate to. The rotation starts from the larger of
    /// `current_rotation` and the engine's accumulator, so the wheel never
    /// turns backwards.
    pub fn start_spin(&self, stats: &UserStats, current_rotation: f64) -> RewardResult<Session> {
        let mut state = self.state.lock();
        self.ensure_idle(&mut state)?;

        if stats.spins_remaining == 0 {
            state.stats.rejected_not_eligible += 1;
            return Err(RewardError::NotEligible("no spins remaining".to_string()));
        }

        let eligible = self.catalog.eligible_entries(RewardKind::WheelPrize, stats);
        let prize = resolver::choose_wheel_prize(&eligible, state.rng.as_mut())?.clone();
        let segment_index = self
            .catalog
            .segment_index_of(&prize.id)
            .ok_or_else(|| RewardError::NotFound(format!("wheel segment for {}", prize.id)))?;

        let base = if current_rotation.is_finite() {
            current_rotation.max(state.rotation)
        } else {
            state.rotation
        };
        let turns = self.config.min_full_turns
            + resolver::extra_turns(state.rng.as_mut(), self.config.max_extra_turns);
        let target = geometry::aligned_rotation(
            segment_index,
            self.catalog.segment_count(),
            base,
            turns,
        )?;

        let handle = self
            .timer
            .start(self.config.spin_duration_ms, self.config.tick_interval_ms)?;
        let session = self.open_session(
            &mut state,
            SessionKind::Spin,
            None,
            prize,
            Some((segment_index, target)),
            self.config.spin_duration_ms,
            handle,
        );
        state.stats.spins_started += 1;
        log::info!(
            "{} spinning {:.1}° → {:.1}° ({} turns)",
            session.id,
            base,
            target,
            turns
        );
        Ok(session)
    }

    #[allow(clippy::too_many_arguments)]
    fn open_session(
        &self,
        state: &mut EngineState,
        kind: SessionKind,
        offer_id: Option<String>,
        reward: RewardCatalogEntry,
        wheel: Option<(usize, f64)>,
        duration_ms: u64,
        timer: TimerHandle,
    ) -> Session {
        let id = SessionId(state.next_id);
        state.next_id += 1;

        let session = Session {
            id,
            kind,
            offer_id,
            target_rotation_degrees: wheel.map(|(_, rotation)| rotation),
            duration_ms,
            started_at_ms: timer.started_at_ms(),
            state: SessionState::Running,
        };
        state.records.insert(
            id,
            SessionRecord {
                session: session.clone(),
                reward,
                segment_index: wheel.map(|(index, _)| index),
                timer,
                latest: ProgressTick {
                    session_id: id,
                    elapsed_ms: 0,
                    progress_fraction: 0.0,
                    remaining_ms: duration_ms,
                },
                pending_final: None,
            },
        );
        state.active = Some(id);
        session
    }

    /// Reject the request if a session is still running
    fn ensure_idle(&self, state: &mut EngineState) -> RewardResult<()> {
        self.advance_active(state);
        if state.active.is_some() {
            state.stats.rejected_in_progress += 1;
            return Err(RewardError::SessionInProgress);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROGRESS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Sample the timer for the active session and commit what it reports
    fn advance_active(&self, state: &mut EngineState) {
        let Some(id) = state.active else {
            return;
        };
        let Some(handle) = state.records.get(&id).map(|r| r.timer) else {
            state.active = None;
            return;
        };

        match self.timer.sample(handle) {
            Ok(TimerSample::Running(progress)) => {
                if let Some(record) = state.records.get_mut(&id) {
                    record.latest = ProgressTick::from_timer(id, progress);
                }
            }
            Ok(TimerSample::Finished(progress)) => {
                state.complete(id, Some(ProgressTick::from_timer(id, progress)));
            }
            Ok(TimerSample::Completed) => state.complete(id, None),
            Ok(TimerSample::Cancelled) => state.cancel_record(id),
            Err(e) => {
                log::warn!("{} lost its countdown ({}); releasing slot", id, e);
                state.cancel_record(id);
            }
        }
    }

    /// Advance the running session without consuming anything
    ///
    /// Called from the background ticker; returns the latest tick.
    pub fn tick(&self) -> Option<ProgressTick> {
        let mut state = self.state.lock();
        let id = state.active?;
        self.advance_active(&mut state);
        state.records.get(&id).map(|r| r.latest)
    }

    /// Query a session
    ///
    /// Returns the latest tick while running, then the final tick once, then
    /// the result once. Later polls fail with `SessionAlreadyConsumed`.
    ///
    /// Only the last 512 retired sessions are remembered individually. An
    /// older cancelled session also answers `SessionAlreadyConsumed`. A
    /// completed result left unpolled while 64 newer ones completed is
    /// dropped and answers `ResultExpired`.
    pub fn poll(&self, id: SessionId) -> RewardResult<PollOutcome> {
        let mut state = self.state.lock();
        if state.active == Some(id) {
            self.advance_active(&mut state);
        }

        if let Some(record) = state.records.get_mut(&id) {
            match record.session.state {
                SessionState::Running => return Ok(PollOutcome::Progress(record.latest)),
                SessionState::Completed => {
                    if let Some(tick) = record.pending_final.take() {
                        return Ok(PollOutcome::Progress(tick));
                    }
                    let result = record.result();
                    state.retire(id, Retired::Consumed);
                    state.stats.results_delivered += 1;
                    *state
                        .stats
                        .rewards_by_id
                        .entry(result.reward.id.clone())
                        .or_insert(0) += 1;
                    log::info!("{} delivered reward '{}'", id, result.reward.id);
                    return Ok(PollOutcome::Completed(result));
                }
                SessionState::Cancelled => {}
            }
        }

        match state.retired.get(&id) {
            Some(Retired::Consumed) => Err(RewardError::SessionAlreadyConsumed(id)),
            Some(Retired::Cancelled) => Ok(PollOutcome::Cancelled),
            Some(Retired::Expired) => Err(RewardError::ResultExpired(id)),
            None if state.issued(id) => Err(RewardError::SessionAlreadyConsumed(id)),
            None => Err(RewardError::UnknownSession(id)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CANCELLATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Cancel a session
    ///
    /// A cancelled session's pre-chosen reward is discarded and can never be
    /// observed through `poll`. If the session reached its completion
    /// instant first, the cancel is a no-op and the reward stays deliverable.
    pub fn cancel(&self, id: SessionId) -> RewardResult<CancelOutcome> {
        let mut state = self.state.lock();

        if state.active == Some(id) {
            let handle = state
                .records
                .get(&id)
                .map(|r| r.timer)
                .ok_or(RewardError::UnknownSession(id))?;
            return match self.timer.cancel(handle)? {
                CancelOutcome::Cancelled | CancelOutcome::AlreadyCancelled => {
                    state.cancel_record(id);
                    Ok(CancelOutcome::Cancelled)
                }
                CancelOutcome::AlreadyCompleted => {
                    self.advance_active(&mut state);
                    Ok(CancelOutcome::AlreadyCompleted)
                }
            };
        }

        if state.records.contains_key(&id) {
            return Ok(CancelOutcome::AlreadyCompleted);
        }
        match state.retired.get(&id) {
            Some(Retired::Consumed | Retired::Expired) => Ok(CancelOutcome::AlreadyCompleted),
            Some(Retired::Cancelled) => Ok(CancelOutcome::AlreadyCancelled),
            None if state.issued(id) => Err(RewardError::SessionAlreadyConsumed(id)),
            None => Err(RewardError::UnknownSession(id)),
        }
    }
}
