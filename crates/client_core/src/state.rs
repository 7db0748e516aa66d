//! Application state value and the store that publishes it.
//!
//! `AppState` is never mutated in place. Every change goes through one of the
//! `with_*` transitions, which return the next value, and `StateStore` swaps
//! the published `Arc` atomically.

use std::sync::Arc;

use alloy_primitives::Address;
use shared::{
    domain::{BallotSnapshot, Role, VoterRecord},
    error::BallotError,
};
use tokio::sync::watch;

use crate::gate::{permitted_actions, Action, ActionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    /// Bumped on every replacement; results started under an older epoch are
    /// discarded.
    pub epoch: u64,
    pub address: Option<Address>,
}

impl Session {
    pub fn connected(&self) -> bool {
        self.address.is_some()
    }
}

/// Contract data as of the last successful resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub snapshot: Arc<BallotSnapshot>,
    /// Record for the session address; `None` when disconnected or not yet
    /// read under the current session.
    pub voter: Option<VoterRecord>,
}

/// Local `has_voted` override applied while a vote is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingVote {
    pub epoch: u64,
    pub choice: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Submitting(Action),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    InFlight,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub session: Session,
    pub ledger: Option<Ledger>,
    pub pending_vote: Option<PendingVote>,
    pub activity: Activity,
    pub sync: SyncStatus,
    pub last_error: Option<BallotError>,
}

impl AppState {
    pub fn snapshot(&self) -> Option<&Arc<BallotSnapshot>> {
        self.ledger.as_ref().map(|ledger| &ledger.snapshot)
    }

    pub fn voter(&self) -> Option<&VoterRecord> {
        self.ledger.as_ref().and_then(|ledger| ledger.voter.as_ref())
    }

    pub fn role(&self) -> Role {
        let (Some(address), Some(ledger)) = (self.session.address, self.ledger.as_ref()) else {
            return Role::Unknown;
        };
        if address == ledger.snapshot.official_address() {
            Role::Official
        } else if ledger.voter.as_ref().is_some_and(VoterRecord::is_registered) {
            Role::Voter
        } else {
            Role::Unknown
        }
    }

    pub fn has_voted(&self) -> bool {
        self.pending_vote.is_some() || self.voter().is_some_and(|voter| voter.has_voted)
    }

    pub fn permitted_actions(&self) -> ActionSet {
        match self.snapshot() {
            Some(snapshot) => permitted_actions(
                snapshot.phase(),
                self.role(),
                self.has_voted(),
                snapshot.total_voters(),
            ),
            None => ActionSet::empty(),
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.activity, Activity::Submitting(_))
    }

    /// Replaces the session. Identity-bound data (voter record, optimistic
    /// vote) is dropped; the ballot-wide snapshot stays. A write in flight
    /// keeps `activity` set: it belongs to this client, so the new identity
    /// gets `Busy` until it finishes. Sync status resets because reads
    /// started under the old epoch are discarded.
    pub fn with_session(&self, address: Option<Address>) -> Self {
        Self {
            session: Session {
                epoch: self.session.epoch + 1,
                address,
            },
            ledger: self.ledger.as_ref().map(|ledger| Ledger {
                snapshot: Arc::clone(&ledger.snapshot),
                voter: None,
            }),
            pending_vote: None,
            activity: self.activity,
            sync: SyncStatus::Idle,
            last_error: None,
        }
    }

    pub fn with_sync_started(&self) -> Self {
        Self {
            sync: SyncStatus::InFlight,
            ..self.clone()
        }
    }

    /// Installs a freshly read snapshot. Fails if the phase would move
    /// backwards relative to the held snapshot.
    pub fn with_synced(
        &self,
        snapshot: Arc<BallotSnapshot>,
        voter: Option<VoterRecord>,
    ) -> Result<Self, BallotError> {
        if let Some(current) = self.snapshot() {
            if snapshot.phase() < current.phase() {
                return Err(BallotError::read_failure(format!(
                    "ballot phase went backwards from {} to {}",
                    current.phase(),
                    snapshot.phase()
                )));
            }
        }

        let pending_vote = match (&self.pending_vote, &voter) {
            (Some(_), Some(record)) if record.has_voted => None,
            (pending, _) => *pending,
        };
        let last_error = match &self.last_error {
            Some(BallotError::ReadFailure(_)) => None,
            other => other.clone(),
        };

        Ok(Self {
            session: self.session,
            ledger: Some(Ledger { snapshot, voter }),
            pending_vote,
            activity: self.activity,
            sync: SyncStatus::Idle,
            last_error,
        })
    }

    pub fn with_sync_failure(&self, error: BallotError) -> Self {
        Self {
            sync: SyncStatus::Idle,
            last_error: Some(error),
            ..self.clone()
        }
    }

    pub fn with_error(&self, error: BallotError) -> Self {
        Self {
            last_error: Some(error),
            ..self.clone()
        }
    }

    pub fn with_submission_started(&self, action: Action) -> Self {
        Self {
            activity: Activity::Submitting(action),
            last_error: None,
            ..self.clone()
        }
    }

    pub fn with_submission_finished(&self, error: Option<BallotError>) -> Self {
        Self {
            activity: Activity::Idle,
            last_error: error.or_else(|| self.last_error.clone()),
            ..self.clone()
        }
    }

    pub fn with_pending_vote(&self, choice: bool) -> Self {
        Self {
            pending_vote: Some(PendingVote {
                epoch: self.session.epoch,
                choice,
            }),
            ..self.clone()
        }
    }

    /// Rolls back the optimistic vote if it was placed under `epoch`.
    pub fn without_pending_vote(&self, epoch: u64) -> Self {
        let pending_vote = self.pending_vote.filter(|pending| pending.epoch != epoch);
        Self {
            pending_vote,
            ..self.clone()
        }
    }
}

/// Single shared, read-mostly holder of the current `AppState`.
#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<Arc<AppState>>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(AppState::default()));
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Arc<AppState> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.tx.subscribe()
    }

    /// Applies `transition` atomically. Returning `None` leaves the state
    /// untouched; the return value says whether a new state was published.
    pub fn update(&self, transition: impl FnOnce(&AppState) -> Option<AppState>) -> bool {
        self.tx.send_if_modified(|state| match transition(state) {
            Some(next) => {
                *state = Arc::new(next);
                true
            }
            None => false,
        })
    }

    /// Applies `transition` only if the session is still the one identified
    /// by `epoch`.
    pub fn update_for_epoch(
        &self,
        epoch: u64,
        transition: impl FnOnce(&AppState) -> AppState,
    ) -> bool {
        self.update(|state| (state.session.epoch == epoch).then(|| transition(state)))
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
