use std::time::Duration;

use super::*;
use crate::simulated::SimulatedBallot;

fn official() -> Address {
    Address::repeat_byte(0xaa)
}

fn alice() -> Address {
    Address::repeat_byte(0x01)
}

struct Harness {
    chain: Arc<SimulatedBallot>,
    store: StateStore,
    orchestrator: Arc<TransactionOrchestrator>,
    synchronizer: Arc<StateSynchronizer>,
}

impl Harness {
    fn new() -> Self {
        let chain = Arc::new(SimulatedBallot::new(official(), "Olivia", "Build the bridge?"));
        let store = StateStore::new();
        let (events, _) = broadcast::channel(32);
        let synchronizer = Arc::new(StateSynchronizer::new(
            chain.clone(),
            store.clone(),
            events.clone(),
        ));
        let orchestrator = Arc::new(TransactionOrchestrator::new(
            chain.clone(),
            store.clone(),
            Arc::clone(&synchronizer),
            events,
        ));
        Self {
            chain,
            store,
            orchestrator,
            synchronizer,
        }
    }

    async fn act_as(&self, address: Address) {
        self.store
            .update(|state| Some(state.with_session(Some(address))));
        self.synchronizer.resync().await.expect("resync");
    }

    async fn include(&self, from: Address, call: BallotCall) {
        let tx = self.chain.submit(from, call).await.expect("submit");
        let receipt = self.chain.wait_for_inclusion(tx).await.expect("receipt");
        assert!(receipt.success);
    }

    /// Alice registered and voting open, acting as Alice.
    async fn voting_as_alice(&self) {
        self.include(
            official(),
            BallotCall::AddVoter {
                voter: alice(),
                name: "Alice".into(),
            },
        )
        .await;
        self.include(official(), BallotCall::StartVote).await;
        self.act_as(alice()).await;
    }
}

fn register(address: &str, name: &str) -> ActionRequest {
    ActionRequest::RegisterVoter {
        address: address.into(),
        name: name.into(),
    }
}

#[tokio::test]
async fn start_voting_without_voters_is_rejected_locally() {
    let h = Harness::new();
    h.act_as(official()).await;

    let err = h
        .orchestrator
        .submit(ActionRequest::StartVoting)
        .await
        .expect_err("no voters yet");

    assert_eq!(
        err,
        BallotError::validation("add at least one voter before starting the vote")
    );
    assert_eq!(h.chain.dispatch_count(), 0);
    assert_eq!(h.store.current().last_error, Some(err));
}

#[tokio::test]
async fn register_voter_input_is_checked_before_dispatch() {
    let h = Harness::new();
    h.act_as(official()).await;

    let err = h
        .orchestrator
        .submit(register("0x1234", "Alice"))
        .await
        .expect_err("short address");
    assert!(matches!(err, BallotError::Validation(message) if message.starts_with("invalid voter address")));

    let err = h
        .orchestrator
        .submit(register(&alice().to_string(), "   "))
        .await
        .expect_err("blank name");
    assert_eq!(err, BallotError::validation("voter name cannot be empty"));

    assert_eq!(h.chain.dispatch_count(), 0);
}

#[tokio::test]
async fn actions_require_a_session_and_a_role() {
    let h = Harness::new();
    let err = h
        .orchestrator
        .submit(ActionRequest::EndVoting)
        .await
        .expect_err("not connected");
    assert_eq!(err, BallotError::validation("connect a wallet first"));

    h.act_as(Address::repeat_byte(0x77)).await;
    let err = h
        .orchestrator
        .submit(ActionRequest::StartVoting)
        .await
        .expect_err("stranger");
    assert_eq!(
        err,
        BallotError::validation("start voting is not available to this account")
    );
    assert_eq!(h.chain.dispatch_count(), 0);
}

#[tokio::test]
async fn second_vote_while_first_in_flight_is_busy() {
    let h = Harness::new();
    h.voting_as_alice().await;
    let dispatched = h.chain.dispatch_count();
    h.chain.hold_inclusions(true);

    let orchestrator = Arc::clone(&h.orchestrator);
    let first = tokio::spawn(async move {
        orchestrator
            .submit(ActionRequest::CastVote { choice: true })
            .await
    });
    while h.chain.pending_transactions().await == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let in_flight = h.store.current();
    assert!(in_flight.is_submitting());
    assert!(in_flight.has_voted());
    assert!(in_flight.permitted_actions().is_empty());

    let second = h
        .orchestrator
        .submit(ActionRequest::CastVote { choice: false })
        .await;
    assert_eq!(second, Err(BallotError::Busy));

    h.chain.hold_inclusions(false);
    let receipt = first.await.expect("join").expect("first vote");
    assert_eq!(receipt.action, Action::CastVote);

    assert_eq!(h.chain.dispatch_count(), dispatched + 1);
    assert_eq!(h.chain.total_vote().await.expect("votes"), 1);
    let state = h.store.current();
    assert!(state.pending_vote.is_none());
    assert!(state.has_voted());
    assert!(!state.is_submitting());
}

#[tokio::test]
async fn abandoned_vote_still_settles_state() {
    let h = Harness::new();
    h.voting_as_alice().await;
    h.chain.hold_inclusions(true);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        h.orchestrator.submit(ActionRequest::CastVote { choice: true }),
    )
    .await;
    assert!(abandoned.is_err());
    assert!(h.store.current().is_submitting());

    h.chain.hold_inclusions(false);
    let mut rx = h.store.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| !state.is_submitting()))
        .await
        .expect("settled in time")
        .expect("store alive");

    assert_eq!(h.chain.total_vote().await.expect("votes"), 1);
    let state = h.store.current();
    assert!(state.pending_vote.is_none());
    assert!(state.has_voted());

    let err = h
        .orchestrator
        .submit(ActionRequest::CastVote { choice: false })
        .await
        .expect_err("already voted");
    assert!(matches!(err, BallotError::Validation(_)));
}

#[tokio::test]
async fn account_switch_mid_submission_stays_busy() {
    let h = Harness::new();
    h.voting_as_alice().await;
    h.chain.hold_inclusions(true);

    let orchestrator = Arc::clone(&h.orchestrator);
    let vote = tokio::spawn(async move {
        orchestrator
            .submit(ActionRequest::CastVote { choice: true })
            .await
    });
    while h.chain.pending_transactions().await == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    h.act_as(official()).await;
    let state = h.store.current();
    assert!(state.is_submitting());
    assert!(state.pending_vote.is_none());
    assert_eq!(
        h.orchestrator.submit(ActionRequest::EndVoting).await,
        Err(BallotError::Busy)
    );

    h.chain.hold_inclusions(false);
    vote.await.expect("join").expect("vote confirmed");
    let state = h.store.current();
    assert!(!state.is_submitting());
    assert_eq!(state.session.address, Some(official()));
    assert!(state.permitted_actions().contains(Action::EndVoting));
}

#[tokio::test]
async fn rejected_vote_rolls_back_optimistic_patch() {
    let h = Harness::new();
    h.voting_as_alice().await;
    h.chain.set_reject_requests(true).await;

    let err = h
        .orchestrator
        .submit(ActionRequest::CastVote { choice: true })
        .await
        .expect_err("declined in wallet");
    assert_eq!(err, BallotError::UserRejected);

    let state = h.store.current();
    assert!(state.pending_vote.is_none());
    assert!(!state.has_voted());
    assert!(!state.is_submitting());
    assert_eq!(state.last_error, Some(BallotError::UserRejected));
    assert!(state.permitted_actions().contains(Action::CastVote));
}

#[tokio::test]
async fn vote_from_outdated_view_fails_without_counting() {
    let h = Harness::new();
    h.voting_as_alice().await;
    h.include(alice(), BallotCall::DoVote { choice: true }).await;

    let err = h
        .orchestrator
        .submit(ActionRequest::CastVote { choice: true })
        .await
        .expect_err("already voted on chain");
    assert_eq!(err, BallotError::transaction_failed(NOT_ELIGIBLE_TO_VOTE));
    assert_eq!(h.chain.total_vote().await.expect("votes"), 1);
    assert!(h.store.current().pending_vote.is_none());
}

#[tokio::test]
async fn official_actions_move_phase_forward() {
    let h = Harness::new();
    h.act_as(official()).await;
    let mut phase = BallotPhase::Created;

    let requests = [
        register(&alice().to_string(), "Alice"),
        ActionRequest::StartVoting,
        ActionRequest::EndVoting,
    ];
    for request in requests {
        h.orchestrator.submit(request).await.expect("confirmed");
        let next = h.store.current().snapshot().expect("snapshot").phase();
        assert!(next >= phase);
        phase = next;
    }
    assert_eq!(phase, BallotPhase::Ended);

    let err = h
        .orchestrator
        .submit(ActionRequest::StartVoting)
        .await
        .expect_err("ballot is over");
    assert!(matches!(err, BallotError::Validation(_)));

    let snapshot = h.store.current().snapshot().cloned().expect("snapshot");
    assert_eq!(snapshot.total_voters(), 1);
    assert_eq!(snapshot.final_yes_votes(), Some(0));
}
