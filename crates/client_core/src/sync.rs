//! Pulls the contract's state into an immutable snapshot.
//!
//! The reads are independent calls, so a snapshot is only eventually
//! consistent: the phase can advance between `state()` and the reads that
//! follow it. Because phases only move forward and every dependent field is
//! read after `state()`, the result is still coherent for the phase it
//! reports; it may simply be one transition behind.

use std::sync::Arc;

use alloy_primitives::Address;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use shared::{
    domain::{BallotPhase, BallotSnapshot, VoterRecord},
    error::BallotError,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    gateway::{ContractGateway, GatewayError},
    state::{AppState, Session, StateStore},
    ClientEvent,
};

pub type ResyncResult = Result<Arc<BallotSnapshot>, BallotError>;

type SharedResync = Shared<BoxFuture<'static, ResyncResult>>;

struct InFlight {
    round: u64,
    /// Session epoch the round reads for.
    epoch: u64,
    future: SharedResync,
}

#[derive(Default)]
struct RoundSlot {
    started: u64,
    in_flight: Option<InFlight>,
}

struct SyncInner {
    gateway: Arc<dyn ContractGateway>,
    store: StateStore,
    events: broadcast::Sender<ClientEvent>,
    slot: Mutex<RoundSlot>,
}

pub struct StateSynchronizer {
    inner: Arc<SyncInner>,
}

impl StateSynchronizer {
    pub fn new(
        gateway: Arc<dyn ContractGateway>,
        store: StateStore,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                gateway,
                store,
                events,
                slot: Mutex::new(RoundSlot::default()),
            }),
        }
    }

    /// Reads the contract and installs a new snapshot. Concurrent calls share
    /// the round already in flight for the current session; a round started
    /// under a replaced session is left to be discarded.
    pub async fn resync(&self) -> ResyncResult {
        let (_, future) = self.join_or_start().await;
        future.await
    }

    /// Like [`resync`](Self::resync), but only shares a round that started
    /// after this call. Used once a write is confirmed.
    pub async fn resync_fresh(&self) -> ResyncResult {
        let floor = self.inner.slot.lock().await.started;
        loop {
            let (round, future) = self.join_or_start().await;
            if round > floor {
                return future.await;
            }
            let _ = future.await;
        }
    }

    async fn join_or_start(&self) -> (u64, SharedResync) {
        let mut slot = self.inner.slot.lock().await;
        let origin = self.inner.store.current().session;
        if let Some(in_flight) = &slot.in_flight {
            if in_flight.epoch == origin.epoch {
                debug!("sync: joining round={}", in_flight.round);
                return (in_flight.round, in_flight.future.clone());
            }
            debug!(
                "sync: round={} belongs to epoch={}, starting a new one",
                in_flight.round, in_flight.epoch
            );
        }

        slot.started += 1;
        let round = slot.started;
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.run_round(round, origin).await;
            inner.finish_round(round).await;
            result
        });
        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => Err(BallotError::read_failure(format!(
                    "resync task failed: {err}"
                ))),
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            round,
            epoch: origin.epoch,
            future: future.clone(),
        });
        (round, future)
    }
}

impl SyncInner {
    async fn finish_round(&self, round: u64) {
        let mut slot = self.slot.lock().await;
        if slot
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.round == round)
        {
            slot.in_flight = None;
        }
    }

    async fn run_round(&self, round: u64, origin: Session) -> ResyncResult {
        self.store
            .update_for_epoch(origin.epoch, AppState::with_sync_started);
        debug!("sync: round={round} started epoch={}", origin.epoch);

        match read_ballot(self.gateway.as_ref(), origin.address).await {
            Ok((snapshot, voter)) => self.apply_snapshot(origin.epoch, Arc::new(snapshot), voter),
            Err(err) => self.apply_failure(origin.epoch, err),
        }
    }

    fn apply_snapshot(
        &self,
        epoch: u64,
        snapshot: Arc<BallotSnapshot>,
        voter: Option<VoterRecord>,
    ) -> ResyncResult {
        let mut outcome = None;
        self.store.update(|state| {
            if state.session.epoch != epoch {
                return None;
            }
            match state.with_synced(Arc::clone(&snapshot), voter) {
                Ok(next) => {
                    outcome = Some(Ok(Arc::clone(&snapshot)));
                    Some(next)
                }
                Err(err) => {
                    let next = state.with_sync_failure(err.clone());
                    outcome = Some(Err(err));
                    Some(next)
                }
            }
        });

        match outcome {
            Some(Ok(snapshot)) => {
                info!(
                    "sync: snapshot applied phase={} voters={} votes={}",
                    snapshot.phase(),
                    snapshot.total_voters(),
                    snapshot.total_votes()
                );
                let _ = self
                    .events
                    .send(ClientEvent::SnapshotUpdated(Arc::clone(&snapshot)));
                Ok(snapshot)
            }
            Some(Err(err)) => {
                warn!("sync: snapshot rejected: {err}");
                let _ = self.events.send(ClientEvent::ResyncFailed(err.clone()));
                Err(err)
            }
            None => self.discard(epoch),
        }
    }

    fn apply_failure(&self, epoch: u64, err: BallotError) -> ResyncResult {
        let applied = self
            .store
            .update_for_epoch(epoch, |state| state.with_sync_failure(err.clone()));
        if !applied {
            return self.discard(epoch);
        }
        warn!("sync: read failed, keeping previous snapshot: {err}");
        let _ = self.events.send(ClientEvent::ResyncFailed(err.clone()));
        Err(err)
    }

    fn discard(&self, epoch: u64) -> ResyncResult {
        info!("sync: discarded result from stale session epoch={epoch}");
        let _ = self.events.send(ClientEvent::ResyncDiscarded);
        Err(BallotError::read_failure(
            "session changed while reading; result discarded",
        ))
    }
}

/// Issues the batch of view calls for one snapshot. `state()` goes first so
/// the conditional reads are decided by it.
pub async fn read_ballot(
    gateway: &dyn ContractGateway,
    account: Option<Address>,
) -> Result<(BallotSnapshot, Option<VoterRecord>), BallotError> {
    let raw_state = gateway
        .state()
        .await
        .map_err(GatewayError::into_read_failure)?;
    let phase = BallotPhase::from_wire(raw_state)
        .ok_or_else(|| BallotError::read_failure(format!("unknown ballot state {raw_state}")))?;

    let (proposal, total_voters, total_votes, official_address, official_name) = futures::try_join!(
        gateway.proposal(),
        gateway.total_voter(),
        gateway.total_vote(),
        gateway.ballot_official_address(),
        gateway.ballot_official_name(),
    )
    .map_err(GatewayError::into_read_failure)?;

    let final_yes_votes = if phase == BallotPhase::Ended {
        Some(
            gateway
                .final_result()
                .await
                .map_err(GatewayError::into_read_failure)?,
        )
    } else {
        None
    };

    let voter = match account {
        Some(account) => Some(
            gateway
                .voter_register(account)
                .await
                .map_err(GatewayError::into_read_failure)?,
        ),
        None => None,
    };

    let snapshot = BallotSnapshot::new(
        phase,
        proposal,
        official_address,
        official_name,
        total_voters,
        total_votes,
        final_yes_votes,
    )
    .map_err(|err| BallotError::read_failure(format!("inconsistent ballot data: {err}")))?;

    Ok((snapshot, voter))
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
