use super::*;
use crate::{gateway::MissingWalletProvider, simulated::SimulatedBallot};

fn official() -> Address {
    Address::repeat_byte(0xaa)
}

#[tokio::test]
async fn connect_adopts_first_account() {
    let store = StateStore::new();
    let chain = Arc::new(SimulatedBallot::new(official(), "Olivia", "p"));
    let wallet = WalletSession::new(chain, store.clone());

    let session = wallet.connect().await.expect("connect");
    assert_eq!(session.address, Some(official()));
    assert_eq!(store.current().session, session);
}

#[tokio::test]
async fn connect_without_provider_is_unavailable() {
    let wallet = WalletSession::new(Arc::new(MissingWalletProvider::default()), StateStore::new());
    let err = wallet.connect().await.expect_err("no provider");
    assert!(matches!(err, BallotError::WalletUnavailable(_)));
}

#[tokio::test]
async fn declined_or_empty_authorization_is_user_rejected() {
    let chain = Arc::new(SimulatedBallot::new(official(), "Olivia", "p"));
    let wallet = WalletSession::new(chain.clone(), StateStore::new());

    chain.set_reject_requests(true).await;
    assert_eq!(wallet.connect().await, Err(BallotError::UserRejected));

    chain.set_reject_requests(false).await;
    chain.switch_account(None).await;
    assert_eq!(wallet.connect().await, Err(BallotError::UserRejected));
}

#[tokio::test]
async fn account_change_replaces_session_with_new_epoch() {
    let store = StateStore::new();
    let chain = Arc::new(SimulatedBallot::new(official(), "Olivia", "p"));
    let wallet = WalletSession::new(chain, store);
    let first = wallet.connect().await.expect("connect");

    let other = Address::repeat_byte(0x02);
    let replaced = wallet
        .apply_accounts_changed(&[other])
        .expect("session replaced");
    assert_eq!(replaced.address, Some(other));
    assert!(replaced.epoch > first.epoch);

    assert!(wallet.apply_accounts_changed(&[other]).is_none());

    let gone = wallet.apply_accounts_changed(&[]).expect("disconnected");
    assert!(!gone.connected());
}
