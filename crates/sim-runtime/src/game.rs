//! Game session: the public command surface.
//!
//! The committed context sits behind an `RwLock`; a busy flag serializes
//! turn execution and external commands. A caller arriving while the flag is
//! set gets [`SimError::TurnInProgress`] instead of waiting.

use crate::{SimContext, TurnManager, TurnReport};
use sim_core::{Event, EventKind, GameSnapshot, GovernanceMode, SimConfig, SimError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct Game {
    context: RwLock<SimContext>,
    manager: Mutex<TurnManager>,
    busy: AtomicBool,
}

/// Holds the busy flag; released on drop.
pub struct TurnGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

fn poisoned() -> SimError {
    SimError::Economics("game state lock poisoned".into())
}

impl Game {
    /// Validate the configuration and set up turn 0.
    pub fn start_game(config: SimConfig) -> Result<Self, SimError> {
        let context = SimContext::new(config)?;
        tracing::info!(
            m2 = %context.ledger.money_supply(),
            mode = %context.config.policy.initial_mode,
            "game started"
        );
        Ok(Self {
            context: RwLock::new(context),
            manager: Mutex::new(TurnManager::new()),
            busy: AtomicBool::new(false),
        })
    }

    /// Continue from a previously captured context.
    pub fn resume(context: SimContext) -> Result<Self, SimError> {
        sim_core::validate_config(&context.config)?;
        Ok(Self {
            context: RwLock::new(context),
            manager: Mutex::new(TurnManager::new()),
            busy: AtomicBool::new(false),
        })
    }

    /// Claim the busy flag, failing fast when someone else holds it.
    pub fn try_begin(&self) -> Result<TurnGuard<'_>, SimError> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| SimError::TurnInProgress)?;
        Ok(TurnGuard { busy: &self.busy })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SimContext>, SimError> {
        self.context.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SimContext>, SimError> {
        self.context.write().map_err(|_| poisoned())
    }

    /// Play one full turn. On failure the previous state is kept.
    pub fn advance_turn(&self) -> Result<TurnReport, SimError> {
        let _guard = self.try_begin()?;
        let current = self.read()?.clone();
        let mut manager = self.manager.lock().map_err(|_| poisoned())?;
        let (next, report) = manager.run_turn(&current)?;
        *self.write()? = next;
        Ok(report)
    }

    /// Switch governance; takes effect at the next policy meeting.
    pub fn set_governance_mode(&self, mode: GovernanceMode) -> Result<(), SimError> {
        let _guard = self.try_begin()?;
        let mut ctx = self.write()?;
        let turn = ctx.state.turn;
        if ctx.central_bank_mut()?.set_mode(mode) {
            tracing::info!(turn, %mode, "governance changed");
            ctx.events.push(Event::new(
                turn,
                EventKind::GovernanceChanged,
                format!("Monetary policy now set in {mode} mode"),
            ));
        }
        Ok(())
    }

    /// Register a proposed fed funds rate for the next democratic meeting.
    pub fn submit_vote(&self, voter: &str, rate: f64) -> Result<(), SimError> {
        let _guard = self.try_begin()?;
        let mut ctx = self.write()?;
        let turn = ctx.state.turn;
        let policy = ctx.config.policy.clone();
        let result = ctx.central_bank_mut()?.submit_vote(voter, rate, &policy);
        match result {
            Ok(()) => {
                ctx.events.push(Event::new(
                    turn,
                    EventKind::VoteRecorded,
                    format!("{} proposes {:.2}%", voter.trim(), rate * 100.0),
                ));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(turn, voter, rate, "vote rejected");
                ctx.events.push(Event::from_error(turn, &e));
                Err(e)
            }
        }
    }

    /// Deep copy of the last committed state.
    pub fn snapshot(&self) -> Result<GameSnapshot, SimError> {
        self.read()?.snapshot()
    }

    pub fn turn(&self) -> Result<u64, SimError> {
        Ok(self.read()?.state.turn)
    }
}
