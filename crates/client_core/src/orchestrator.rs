//! The only write path: validate, dispatch, await inclusion, resync.

use std::sync::Arc;

use alloy_primitives::Address;
use shared::{
    domain::{parse_address, BallotPhase, Role},
    error::BallotError,
    protocol::BallotCall,
    TxHash,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    gate::Action,
    gateway::{ContractGateway, GatewayError},
    state::{AppState, StateStore},
    sync::StateSynchronizer,
    ClientEvent,
};

pub const NOT_ELIGIBLE_TO_VOTE: &str = "not registered or already voted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    /// `address` is raw user input; it is checked before anything is sent.
    RegisterVoter { address: String, name: String },
    StartVoting,
    EndVoting,
    CastVote { choice: bool },
}

impl ActionRequest {
    pub fn action(&self) -> Action {
        match self {
            Self::RegisterVoter { .. } => Action::RegisterVoter,
            Self::StartVoting => Action::StartVoting,
            Self::EndVoting => Action::EndVoting,
            Self::CastVote { .. } => Action::CastVote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub action: Action,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

struct OrchestratorInner {
    gateway: Arc<dyn ContractGateway>,
    store: StateStore,
    synchronizer: Arc<StateSynchronizer>,
    events: broadcast::Sender<ClientEvent>,
}

pub struct TransactionOrchestrator {
    inner: Arc<OrchestratorInner>,
    in_flight: Arc<Mutex<()>>,
}

impl TransactionOrchestrator {
    pub fn new(
        gateway: Arc<dyn ContractGateway>,
        store: StateStore,
        synchronizer: Arc<StateSynchronizer>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                gateway,
                store,
                synchronizer,
                events,
            }),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Validates and sends one write. Once dispatched, the write runs on its
    /// own task and settles the state even if the caller stops waiting.
    pub async fn submit(&self, request: ActionRequest) -> Result<SubmitReceipt, BallotError> {
        let action = request.action();
        let Ok(guard) = Arc::clone(&self.in_flight).try_lock_owned() else {
            debug!(action = %action, "orchestrator: submission already in flight");
            return Err(BallotError::Busy);
        };

        let store = &self.inner.store;
        let state = store.current();
        let (from, call) = match validate(&state, &request) {
            Ok(validated) => validated,
            Err(err) => {
                debug!(action = %action, "orchestrator: rejected locally: {err}");
                store.update(|state| Some(state.with_submission_finished(Some(err.clone()))));
                return Err(err);
            }
        };

        let epoch = state.session.epoch;
        store.update_for_epoch(epoch, |state| {
            let next = state.with_submission_started(action);
            match &call {
                BallotCall::DoVote { choice } => next.with_pending_vote(*choice),
                _ => next,
            }
        });
        let _ = self
            .inner
            .events
            .send(ClientEvent::SubmissionStarted { action });

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _guard = guard;
            inner.run_submission(from, call, action, epoch).await
        });
        match task.await {
            Ok(result) => result,
            Err(err) => Err(BallotError::transaction_failed(format!(
                "submission task failed: {err}"
            ))),
        }
    }
}

impl OrchestratorInner {
    async fn run_submission(
        &self,
        from: Address,
        call: BallotCall,
        action: Action,
        epoch: u64,
    ) -> Result<SubmitReceipt, BallotError> {
        match self.dispatch(from, call, action).await {
            Ok(receipt) => {
                info!(
                    "orchestrator: confirmed action={action} tx={} block={:?}",
                    receipt.tx_hash, receipt.block_number
                );
                if let Err(err) = self.synchronizer.resync_fresh().await {
                    warn!("orchestrator: action={action} confirmed but resync failed: {err}");
                }
                self.store
                    .update(|state| Some(state.with_submission_finished(None)));
                let _ = self.events.send(ClientEvent::SubmissionConfirmed(receipt));
                Ok(receipt)
            }
            Err(err) => {
                warn!("orchestrator: action={action} failed: {err}");
                self.store.update(|state| {
                    let next = if state.session.epoch == epoch {
                        state
                            .without_pending_vote(epoch)
                            .with_submission_finished(Some(err.clone()))
                    } else {
                        state.with_submission_finished(None)
                    };
                    Some(next)
                });
                let _ = self.events.send(ClientEvent::SubmissionFailed {
                    action,
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    async fn dispatch(
        &self,
        from: Address,
        call: BallotCall,
        action: Action,
    ) -> Result<SubmitReceipt, BallotError> {
        let method = call.method_name();
        let tx_hash = self
            .gateway
            .submit(from, call)
            .await
            .map_err(|err| classify_failure(action, err))?;
        info!("orchestrator: dispatched method={method} tx={tx_hash}");

        let receipt = self
            .gateway
            .wait_for_inclusion(tx_hash)
            .await
            .map_err(|err| classify_failure(action, err))?;
        if !receipt.success {
            let reason = match action {
                Action::CastVote => NOT_ELIGIBLE_TO_VOTE.to_string(),
                _ => format!("{method} reverted on chain"),
            };
            return Err(BallotError::transaction_failed(reason));
        }

        Ok(SubmitReceipt {
            action,
            tx_hash,
            block_number: receipt.block_number,
        })
    }
}

fn classify_failure(action: Action, err: GatewayError) -> BallotError {
    match err {
        GatewayError::UserRejected => BallotError::UserRejected,
        GatewayError::Reverted(_) if action == Action::CastVote => {
            BallotError::transaction_failed(NOT_ELIGIBLE_TO_VOTE)
        }
        other => BallotError::transaction_failed(other.to_string()),
    }
}

/// Local checks run before anything reaches the network.
pub fn validate(
    state: &AppState,
    request: &ActionRequest,
) -> Result<(Address, BallotCall), BallotError> {
    let call = match request {
        ActionRequest::RegisterVoter { address, name } => {
            let voter = parse_address(address)
                .map_err(|err| BallotError::validation(format!("invalid voter address: {err}")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(BallotError::validation("voter name cannot be empty"));
            }
            BallotCall::AddVoter {
                voter,
                name: name.to_string(),
            }
        }
        ActionRequest::StartVoting => BallotCall::StartVote,
        ActionRequest::EndVoting => BallotCall::EndVote,
        ActionRequest::CastVote { choice } => BallotCall::DoVote { choice: *choice },
    };

    let Some(from) = state.session.address else {
        return Err(BallotError::validation("connect a wallet first"));
    };
    let Some(snapshot) = state.snapshot() else {
        return Err(BallotError::validation("ballot data has not been loaded yet"));
    };

    let action = request.action();
    if !state.permitted_actions().contains(action) {
        let role = state.role();
        let message = if role == Role::Unknown {
            format!("{action} is not available to this account")
        } else if action == Action::StartVoting
            && role == Role::Official
            && snapshot.phase() == BallotPhase::Created
            && snapshot.total_voters() == 0
        {
            "add at least one voter before starting the vote".to_string()
        } else if action == Action::CastVote
            && role == Role::Voter
            && snapshot.phase() == BallotPhase::Voting
        {
            "this account has already voted".to_string()
        } else {
            format!(
                "{action} is not allowed for the {role} while the ballot is {}",
                snapshot.phase()
            )
        };
        return Err(BallotError::validation(message));
    }

    Ok((from, call))
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
